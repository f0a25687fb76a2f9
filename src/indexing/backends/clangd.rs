//! clangd backend.
//!
//! Talks LSP to a clangd child process over stdio: `initialize`, then for
//! each file `didOpen`, `textDocument/documentSymbol` and `didClose`, then
//! `shutdown` and `exit`. A reader thread decodes framed messages into a
//! channel so every request can time out instead of hanging the build.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use serde_json::{Value, json};
use thiserror::Error;

use super::{SymbolBackend, command_available, split_parameters};
use crate::error::{IndexError, IndexResult};
use crate::indexing::walker::relative_path;
use crate::parsing::Language;
use crate::symbol::{Symbol, SymbolDetail};
use crate::types::{Backend, SymbolId, SymbolKind};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// LSP `SymbolKind` codes this backend maps.
mod lsp_kind {
    pub const CLASS: u64 = 5;
    pub const METHOD: u64 = 6;
    pub const CONSTRUCTOR: u64 = 9;
    pub const ENUM: u64 = 10;
    pub const FUNCTION: u64 = 12;
    pub const VARIABLE: u64 = 13;
    pub const CONSTANT: u64 = 14;
    pub const STRUCT: u64 = 23;
    pub const TYPE_PARAMETER: u64 = 26;
}

#[derive(Debug, Error)]
enum LspError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("no response to {0} before the timeout")]
    Timeout(String),

    #[error("server closed the connection")]
    Closed,

    #[error("{method} failed: {error}")]
    Server { method: String, error: String },
}

impl LspError {
    /// The session cannot serve further requests.
    fn is_fatal(&self) -> bool {
        matches!(self, LspError::Io(_) | LspError::Closed)
    }
}

#[derive(Debug, Clone)]
pub struct ClangdBackend {
    command: String,
    timeout: Duration,
}

impl ClangdBackend {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn unavailable(&self, reason: impl ToString) -> IndexError {
        IndexError::BackendUnavailable {
            backend: Backend::Clangd.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl SymbolBackend for ClangdBackend {
    fn backend(&self) -> Backend {
        Backend::Clangd
    }

    fn is_available(&self) -> bool {
        command_available(&self.command, "--version")
    }

    fn extract(&self, root: &Path, files: &[PathBuf]) -> IndexResult<Vec<Symbol>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let mut session = LspSession::start(&self.command, self.timeout).map_err(|e| self.unavailable(e))?;
        session
            .request(
                "initialize",
                json!({
                    "processId": std::process::id(),
                    "rootUri": file_uri(root),
                    "capabilities": {
                        "textDocument": {
                            "documentSymbol": { "hierarchicalDocumentSymbolSupport": true }
                        }
                    }
                }),
            )
            .map_err(|e| self.unavailable(e))?;
        session.notify("initialized", json!({})).map_err(|e| self.unavailable(e))?;

        let mut symbols = Vec::new();
        for file in files {
            let relative = relative_path(root, file);
            let source = match std::fs::read_to_string(file) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("[clangd] cannot read {relative}: {e}");
                    continue;
                }
            };
            let language = Language::from_path(file).unwrap_or(Language::C);

            match session.document_symbols(file, language, &source) {
                Ok(response) => symbols.extend(convert_symbols(&response, &relative, &source)),
                Err(e) if e.is_fatal() => return Err(self.unavailable(e)),
                Err(e) => tracing::warn!("[clangd] {relative}: {e}"),
            }
        }

        session.shutdown();
        crate::debug_event!("clangd", "extracted", "{} symbols from {} files", symbols.len(), files.len());
        Ok(symbols)
    }
}

/// A running clangd process plus the thread reading its stdout.
struct LspSession {
    child: Child,
    stdin: ChildStdin,
    messages: Receiver<Value>,
    reader: Option<JoinHandle<()>>,
    next_id: u64,
    timeout: Duration,
}

impl LspSession {
    fn start(command: &str, timeout: Duration) -> Result<Self, LspError> {
        let mut child = Command::new(command)
            .arg("--log=error")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(LspError::Closed);
        };

        let (tx, rx) = unbounded();
        let reader = thread::spawn(move || {
            let mut stdout = BufReader::new(stdout);
            while let Ok(Some(message)) = read_message(&mut stdout) {
                if tx.send(message).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            child,
            stdin,
            messages: rx,
            reader: Some(reader),
            next_id: 0,
            timeout,
        })
    }

    fn request(&mut self, method: &str, params: Value) -> Result<Value, LspError> {
        self.next_id += 1;
        let id = self.next_id;
        write_message(&mut self.stdin, &envelope(Some(id), method, params))?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.messages.recv_timeout(remaining) {
                // Server-initiated requests and notifications carry a method
                Ok(message) if message.get("method").is_some() => continue,
                Ok(message) if message.get("id").and_then(Value::as_u64) != Some(id) => continue,
                Ok(message) => {
                    if let Some(error) = message.get("error") {
                        return Err(LspError::Server {
                            method: method.to_string(),
                            error: error.to_string(),
                        });
                    }
                    return Ok(message.get("result").cloned().unwrap_or(Value::Null));
                }
                Err(RecvTimeoutError::Timeout) => return Err(LspError::Timeout(method.to_string())),
                Err(RecvTimeoutError::Disconnected) => return Err(LspError::Closed),
            }
        }
    }

    fn notify(&mut self, method: &str, params: Value) -> Result<(), LspError> {
        write_message(&mut self.stdin, &envelope(None, method, params))?;
        Ok(())
    }

    fn document_symbols(&mut self, file: &Path, language: Language, source: &str) -> Result<Value, LspError> {
        let uri = file_uri(file);
        self.notify(
            "textDocument/didOpen",
            json!({
                "textDocument": {
                    "uri": uri,
                    "languageId": language.name(),
                    "version": 1,
                    "text": source,
                }
            }),
        )?;
        let response = self.request("textDocument/documentSymbol", json!({ "textDocument": { "uri": uri } }));
        self.notify("textDocument/didClose", json!({ "textDocument": { "uri": uri } }))?;
        response
    }

    fn shutdown(mut self) {
        if let Err(e) = self.request("shutdown", Value::Null) {
            crate::debug_event!("clangd", "shutdown", "{e}");
        }
        let _ = self.notify("exit", Value::Null);
    }
}

impl Drop for LspSession {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

fn envelope(id: Option<u64>, method: &str, params: Value) -> Value {
    let mut message = json!({ "jsonrpc": "2.0", "method": method });
    if let Some(id) = id {
        message["id"] = json!(id);
    }
    if !params.is_null() {
        message["params"] = params;
    }
    message
}

/// Write one `Content-Length` framed JSON-RPC message.
fn write_message(writer: &mut impl Write, message: &Value) -> io::Result<()> {
    let body = serde_json::to_vec(message)?;
    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(&body)?;
    writer.flush()
}

/// Read one framed message; `None` at end of stream.
fn read_message(reader: &mut impl BufRead) -> io::Result<Option<Value>> {
    let mut header = String::new();
    let mut content_length = None;
    let length = loop {
        header.clear();
        if reader.read_line(&mut header)? == 0 {
            return Ok(None);
        }
        let line = header.trim_end();
        if line.is_empty() {
            match content_length {
                Some(length) => break length,
                None => continue,
            }
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse::<usize>().ok();
            }
        }
    };

    let mut body = vec![0; length];
    reader.read_exact(&mut body)?;
    serde_json::from_slice(&body).map(Some).map_err(io::Error::from)
}

/// `file://` URI for an absolute path, percent-encoding reserved bytes.
fn file_uri(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    let mut uri = String::from("file://");
    if !text.starts_with('/') {
        uri.push('/');
    }
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' | b':' => {
                uri.push(char::from(byte))
            }
            _ => uri.push_str(&format!("%{byte:02X}")),
        }
    }
    uri
}

/// Convert a documentSymbol response, hierarchical or flat, for one file.
fn convert_symbols(response: &Value, file: &str, source: &str) -> Vec<Symbol> {
    let lines: Vec<&str> = source.lines().collect();
    let mut symbols = Vec::new();
    for item in response.as_array().into_iter().flatten() {
        collect(item, file, &lines, &mut symbols);
    }
    symbols
}

fn collect(item: &Value, file: &str, lines: &[&str], out: &mut Vec<Symbol>) {
    // DocumentSymbol has `range`, SymbolInformation nests it in `location`
    let range = item.get("range").or_else(|| item.pointer("/location/range"));
    if let (Some(name), Some(kind), Some(range)) = (item["name"].as_str(), item["kind"].as_u64(), range) {
        let detail = item["detail"].as_str().unwrap_or_default();
        if let Some(symbol) = to_symbol(name, kind, detail, range, file, lines, out.len()) {
            out.push(symbol);
        }
    }
    for child in item["children"].as_array().into_iter().flatten() {
        collect(child, file, lines, out);
    }
}

fn map_kind(kind: u64) -> Option<SymbolKind> {
    match kind {
        lsp_kind::FUNCTION | lsp_kind::METHOD | lsp_kind::CONSTRUCTOR => Some(SymbolKind::Function),
        lsp_kind::CLASS | lsp_kind::STRUCT => Some(SymbolKind::Structure),
        lsp_kind::ENUM => Some(SymbolKind::Enum),
        lsp_kind::TYPE_PARAMETER => Some(SymbolKind::Typedef),
        lsp_kind::VARIABLE | lsp_kind::CONSTANT => Some(SymbolKind::Variable),
        // Namespaces, fields, enum members, properties
        _ => None,
    }
}

fn to_symbol(
    name: &str,
    kind_code: u64,
    detail: &str,
    range: &Value,
    file: &str,
    lines: &[&str],
    ordinal: usize,
) -> Option<Symbol> {
    let kind = map_kind(kind_code)?;
    let (start_line, _) = position(&range["start"])?;
    let end = position(&range["end"])?;
    // Prototypes are declarations, not definitions
    if kind == SymbolKind::Function && !ends_with_body(lines, end) {
        return None;
    }

    let detail = detail.trim();
    let declaration = lines.get(start_line).map(|l| l.trim()).unwrap_or(name);
    let words: Vec<&str> = declaration.split_whitespace().collect();

    let symbol_detail = match kind {
        SymbolKind::Function => {
            let (return_type, parameters) = split_signature(detail);
            SymbolDetail::function(return_type, parameters)
        }
        SymbolKind::Structure => SymbolDetail::Struct { members: Vec::new() },
        SymbolKind::Enum => SymbolDetail::Enum { values: Vec::new() },
        SymbolKind::Typedef => SymbolDetail::Typedef {
            underlying: detail.to_string(),
        },
        SymbolKind::Variable => SymbolDetail::Variable {
            data_type: detail.to_string(),
            is_static: words.contains(&"static"),
            is_const: kind_code == lsp_kind::CONSTANT || words.contains(&"const"),
        },
        SymbolKind::Macro => SymbolDetail::Macro {
            parameters: None,
            value: String::new(),
        },
    };

    let line = u32::try_from(start_line).unwrap_or(u32::MAX).saturating_add(1);
    let ordinal = u32::try_from(ordinal).unwrap_or(u32::MAX);
    let id = SymbolId::derive(Backend::Clangd, kind, name, file, line, ordinal);
    Some(Symbol::new(id, name, file, line, Backend::Clangd, symbol_detail).with_declaration(declaration))
}

/// Zero-based `(line, character)` of an LSP position.
fn position(value: &Value) -> Option<(usize, usize)> {
    let line = usize::try_from(value["line"].as_u64()?).ok()?;
    let character = usize::try_from(value["character"].as_u64()?).ok()?;
    Some((line, character))
}

/// Whether the text just before `end` closes a body.
fn ends_with_body(lines: &[&str], (line, character): (usize, usize)) -> bool {
    lines.get(line).is_some_and(|text| {
        let head: String = text.chars().take(character).collect();
        head.trim_end().ends_with('}')
    })
}

/// clangd function detail `int (int, char **)` into return type and parameters.
fn split_signature(detail: &str) -> (String, Vec<String>) {
    let Some(open) = detail.find('(') else {
        return ("void".to_string(), Vec::new());
    };
    let return_type = detail[..open].trim();
    let return_type = if return_type.is_empty() { "void" } else { return_type };

    let mut depth = 0usize;
    let mut close = detail.len();
    for (offset, ch) in detail[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    close = open + offset + 1;
                    break;
                }
            }
            _ => {}
        }
    }
    (return_type.to_string(), split_parameters(&detail[open..close]))
}
