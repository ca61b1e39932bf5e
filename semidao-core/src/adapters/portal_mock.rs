//! Mock Semidao portal for testing
//!
//! Serves the four endpoints a run touches, under a `/wp` prefix:
//! - GET /wp/home.action sets `JSESSIONID=anonymous` on first visit
//! - POST /wp/j_security_check answers per `LoginBehavior`
//! - GET /wp/displayBills.action returns the bill table only to an authenticated session
//! - GET /wp/docs/* returns a small PDF-like body
//!
//! Every request is recorded so tests can assert on what was sent.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

const ANONYMOUS_COOKIE: &str = "JSESSIONID=anonymous";
const AUTHENTICATED_COOKIE: &str = "JSESSIONID=authenticated";

/// How the login endpoint answers a POST
#[derive(Debug, Clone)]
pub enum LoginBehavior {
    /// 302 to `home.action` and rotate the session cookie, if the form is right
    Accept,
    /// 302 with the given `Location`
    RedirectTo(String),
    /// 302 without a `Location` header
    RedirectWithoutLocation,
    /// Plain status code with an HTML body
    Status(u16),
}

/// Configuration for the mock portal
#[derive(Debug, Clone)]
pub struct MockPortalConfig {
    pub login: LoginBehavior,
    /// Expected `j_username`
    pub email: String,
    /// Expected `j_password` (MD5 hex)
    pub password_hash: String,
    /// Body of the bills page
    pub bills_html: String,
    /// Answer the bills page with a 500 instead
    pub fail_bills: bool,
    /// Close the connection without answering the home page once logged in
    pub drop_home_after_login: bool,
    /// Close the connection without answering the bills page
    pub drop_bills: bool,
}

impl Default for MockPortalConfig {
    fn default() -> Self {
        Self {
            login: LoginBehavior::Accept,
            email: "user@example.com".to_string(),
            // md5("password")
            password_hash: "5f4dcc3b5aa765d61d8327deb882cf99".to_string(),
            bills_html: bills_page(&[]),
            fail_bills: false,
            drop_home_after_login: false,
            drop_bills: false,
        }
    }
}

/// One request as seen by the server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub cookie: Option<String>,
    pub body: String,
}

/// Mock portal server for testing
pub struct MockPortalServer {
    port: u16,
    running: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl MockPortalServer {
    /// Start a new mock server on a random available port
    pub fn start(config: MockPortalConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let requests = Arc::new(Mutex::new(Vec::new()));

        // Non-blocking so the accept loop can observe shutdown
        listener.set_nonblocking(true)?;

        let running_clone = running.clone();
        let requests_clone = requests.clone();
        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let cfg = config.clone();
                        let log = requests_clone.clone();
                        thread::spawn(move || {
                            handle_connection(stream, &cfg, &log);
                        });
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            requests,
            thread_handle: Some(thread_handle),
        })
    }

    /// Portal base URL, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}/wp", self.port)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests whose path ends with `suffix`
    pub fn count(&self, suffix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path.split('?').next().unwrap_or("").ends_with(suffix))
            .count()
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockPortalServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Build a bills page holding one `<tr>` per `(date, reference, amount, href)`
pub fn bills_page(rows: &[(&str, &str, &str, Option<&str>)]) -> String {
    let mut body = String::new();
    for (date, reference, amount, href) in rows {
        let link = match href {
            Some(h) => format!(r#"<a href="{}">PDF</a>"#, h),
            None => String::new(),
        };
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            date, reference, amount, link
        ));
    }
    format!(
        r#"<html><body>
<table id="billTable">
<thead><tr><th>Date</th><th>Référence</th><th>Montant</th><th>Facture</th></tr></thead>
<tbody>
{}</tbody>
</table>
</body></html>"#,
        body
    )
}

fn read_request(stream: &mut TcpStream) -> Option<(String, String)> {
    let mut data = Vec::new();
    let mut buffer = [0; 4096];

    // Read until the header block is complete
    let header_end = loop {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buffer[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);

    while data.len() < header_end + content_length {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..n]);
    }

    let body = String::from_utf8_lossy(&data[header_end..]).to_string();
    Some((head, body))
}

fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (n, v) = line.split_once(':')?;
        if n.eq_ignore_ascii_case(name) {
            Some(v.trim())
        } else {
            None
        }
    })
}

fn form_value(body: &str, key: &str) -> Option<String> {
    url::form_urlencoded::parse(body.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn handle_connection(
    mut stream: TcpStream,
    config: &MockPortalConfig,
    log: &Mutex<Vec<RecordedRequest>>,
) {
    // Accepted sockets inherit non-blocking mode on some platforms
    let _ = stream.set_nonblocking(false);

    let Some((head, body)) = read_request(&mut stream) else {
        return;
    };

    let first_line = head.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        send_response(&mut stream, 400, "Bad Request", &[], "");
        return;
    }

    let method = parts[0].to_string();
    let path = parts[1].to_string();
    let cookie = header_value(&head, "cookie").map(str::to_string);

    if let Ok(mut requests) = log.lock() {
        requests.push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            cookie: cookie.clone(),
            body: body.clone(),
        });
    }

    let cookie = cookie.unwrap_or_default();
    let route = path.split('?').next().unwrap_or("");

    match (method.as_str(), route) {
        ("GET", "/wp/home.action") => {
            if config.drop_home_after_login && cookie.contains(AUTHENTICATED_COOKIE) {
                return;
            }
            if cookie.contains("JSESSIONID=") {
                send_response(&mut stream, 200, "OK", &[], "<html>home</html>");
            } else {
                let set_cookie = format!("{}; Path=/", ANONYMOUS_COOKIE);
                send_response(
                    &mut stream,
                    200,
                    "OK",
                    &[("Set-Cookie", set_cookie.as_str())],
                    "<html>home</html>",
                );
            }
        }
        ("POST", "/wp/j_security_check") => handle_login(&mut stream, config, &cookie, &body),
        ("GET", "/wp/displayBills.action") => {
            if config.drop_bills {
                return;
            }
            if config.fail_bills {
                send_response(&mut stream, 500, "Internal Server Error", &[], "");
            } else if cookie.contains(AUTHENTICATED_COOKIE) {
                send_response(&mut stream, 200, "OK", &[], &config.bills_html);
            } else {
                send_response(&mut stream, 200, "OK", &[], "<html>login</html>");
            }
        }
        ("GET", r) if r.starts_with("/wp/docs/") => {
            let content = format!("%PDF-1.4 mock document {}", r);
            send_response(&mut stream, 200, "OK", &[], &content);
        }
        _ => send_response(&mut stream, 404, "Not Found", &[], ""),
    }
}

fn handle_login(stream: &mut TcpStream, config: &MockPortalConfig, cookie: &str, body: &str) {
    match &config.login {
        LoginBehavior::Accept => {
            let valid = cookie.contains(ANONYMOUS_COOKIE)
                && form_value(body, "j_username").as_deref() == Some(config.email.as_str())
                && form_value(body, "j_password").as_deref()
                    == Some(config.password_hash.as_str())
                && form_value(body, "password").as_deref() == Some("");

            if valid {
                let set_cookie = format!("{}; Path=/", AUTHENTICATED_COOKIE);
                send_response(
                    stream,
                    302,
                    "Found",
                    &[
                        ("Location", "/wp/home.action"),
                        ("Set-Cookie", set_cookie.as_str()),
                    ],
                    "",
                );
            } else {
                send_response(
                    stream,
                    302,
                    "Found",
                    &[("Location", "/wp/login.action?error=true")],
                    "",
                );
            }
        }
        LoginBehavior::RedirectTo(location) => {
            send_response(stream, 302, "Found", &[("Location", location.as_str())], "");
        }
        LoginBehavior::RedirectWithoutLocation => {
            send_response(stream, 302, "Found", &[], "");
        }
        LoginBehavior::Status(code) => {
            send_response(stream, *code, "Status", &[], "<html>login</html>");
        }
    }
}

fn send_response(
    stream: &mut TcpStream,
    status: u16,
    status_text: &str,
    headers: &[(&str, &str)],
    body: &str,
) {
    let mut response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        status_text,
        body.len()
    );
    for (name, value) in headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");
    response.push_str(body);

    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
