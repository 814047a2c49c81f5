//! One-shot chat-completion HTTP server on localhost

use serde_json::json;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

pub struct MockChatServer {
    pub endpoint: String,
    handle: thread::JoinHandle<String>,
}

impl MockChatServer {
    /// Answer the next request with `content` as the first choice
    pub fn answering(content: &str) -> Self {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
        .to_string();
        Self::start("200 OK", body)
    }

    pub fn start(status_line: &str, body: String) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind local port");
        let endpoint = format!(
            "http://{}/v1/chat/completions",
            listener.local_addr().expect("local addr")
        );
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let request = read_request(&mut stream);
            stream.write_all(response.as_bytes()).expect("write response");
            request
        });

        Self { endpoint, handle }
    }

    /// Raw request the server received
    pub fn request(self) -> String {
        self.handle.join().expect("server thread")
    }
}

fn read_request(stream: &mut impl Read) -> String {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).expect("read request");
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            continue;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())?
            })
            .unwrap_or(0);
        if request.len() >= header_end + 4 + content_length {
            break;
        }
    }
    String::from_utf8_lossy(&request).into_owned()
}
