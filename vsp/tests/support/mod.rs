//! A minimal, scriptable stand-in for a VSP simulator, driven over a real
//! loopback TCP socket rather than a mock transport — the same approach
//! the reference implementation's own socket tests take.

use std::{
    io::{Read, Write},
    net::{TcpListener, TcpStream},
};

use vsp_protocol::{encode_frame, DecodeOutcome, Decoder, ACK, NACK};

pub struct FakeSimulator {
    pub addr: std::net::SocketAddr,
    listener: TcpListener,
}

impl FakeSimulator {
    pub fn bind() -> FakeSimulator {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
        let addr = listener.local_addr().expect("local_addr");
        FakeSimulator { addr, listener }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn accept(&self) -> FakeConn {
        let (stream, _) = self.listener.accept().expect("accept");
        FakeConn { stream }
    }
}

pub struct FakeConn {
    stream: TcpStream,
}

impl FakeConn {
    /// Reads one framed request from the client and ACKs it, returning
    /// the decoded payload.
    pub fn recv_command(&mut self) -> String {
        self.recv_command_with_nacks(0)
    }

    /// Reads framed requests, NACKing the first `nacks` identical resends
    /// before finally ACKing, returning the decoded payload.
    pub fn recv_command_with_nacks(&mut self, nacks: usize) -> String {
        let mut remaining_nacks = nacks;
        loop {
            let mut decoder = Decoder::new();
            let mut byte = [0u8; 1];
            let payload = loop {
                self.stream.read_exact(&mut byte).expect("read request byte");
                match decoder.feed_byte(byte[0]) {
                    DecodeOutcome::Pending => continue,
                    DecodeOutcome::Frame(payload) => break payload,
                    other => panic!("unexpected request decode outcome: {:?}", other),
                }
            };

            if remaining_nacks > 0 {
                remaining_nacks -= 1;
                self.stream.write_all(&[NACK]).expect("nack request");
                continue;
            }

            self.stream.write_all(&[ACK]).expect("ack request");
            return String::from_utf8(payload).expect("utf8 payload");
        }
    }

    /// NACKs exactly `n` request frames in a row, then stops without
    /// waiting for a further resend. Used to exhaust the client's retry
    /// budget.
    pub fn nack_requests(&mut self, n: usize) {
        for _ in 0..n {
            let mut decoder = Decoder::new();
            let mut byte = [0u8; 1];
            loop {
                self.stream.read_exact(&mut byte).expect("read request byte");
                match decoder.feed_byte(byte[0]) {
                    DecodeOutcome::Pending => continue,
                    DecodeOutcome::Frame(_) => break,
                    other => panic!("unexpected request decode outcome: {:?}", other),
                }
            }
            self.stream.write_all(&[NACK]).expect("nack request");
        }
    }

    /// Sends a well-formed response frame and waits for the client's ACK.
    pub fn respond(&mut self, payload: &str) {
        self.send_frame_and_await_ack(&encode_frame(payload.as_bytes()));
    }

    /// Sends a frame with a deliberately wrong checksum (to drive a NACK
    /// from the client), then the correct frame, and waits for the final
    /// ACK.
    pub fn respond_after_one_bad_frame(&mut self, payload: &str) {
        let mut bad = encode_frame(payload.as_bytes());
        let len = bad.len();
        bad[len - 1] = b'0';
        bad[len - 2] = b'0';
        self.stream.write_all(&bad).expect("send corrupt frame");
        let mut ack = [0u8; 1];
        self.stream.read_exact(&mut ack).expect("read nack");
        assert_eq!(ack[0], NACK, "client should have nacked the corrupt frame");
        self.respond(payload);
    }

    fn send_frame_and_await_ack(&mut self, frame: &[u8]) {
        self.stream.write_all(frame).expect("send frame");
        let mut ack = [0u8; 1];
        self.stream.read_exact(&mut ack).expect("read ack");
        assert_eq!(ack[0], ACK, "client should have acked a well-formed frame");
    }
}
