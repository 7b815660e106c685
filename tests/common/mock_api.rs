//! Mock extraction API built on wiremock
//!
//! Uploaded files get the id `file-{stem}`. The content endpoint echoes
//! `CONTENT:file-{stem}`, which the completion endpoint reads back out of the prompt
//! to decide which record to return.

use serde_json::json;
use std::collections::{HashMap, HashSet};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Invoice data the mock returns for one document stem
#[derive(Clone, Debug)]
pub struct MockInvoice {
    pub number: String,
    pub date: String,
    pub category: String,
    pub total: String,
}

impl MockInvoice {
    pub fn new(number: &str, date: &str, category: &str, total: &str) -> Self {
        Self {
            number: number.to_string(),
            date: date.to_string(),
            category: category.to_string(),
            total: total.to_string(),
        }
    }
}

struct UploadResponder;

impl Respond for UploadResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body = String::from_utf8_lossy(&request.body);
        let Some(name) = body
            .split("filename=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
        else {
            return ResponseTemplate::new(400).set_body_string("missing file part");
        };
        let stem = name.trim_end_matches(".pdf");
        ResponseTemplate::new(200).set_body_json(json!({
            "id": format!("file-{stem}"),
            "object": "file",
            "filename": name,
            "purpose": "file-extract"
        }))
    }
}

struct ContentResponder;

impl Respond for ContentResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id = request
            .url
            .path_segments()
            .and_then(|mut segments| segments.nth(2))
            .unwrap_or_default()
            .to_string();
        ResponseTemplate::new(200).set_body_json(json!({
            "content": format!("CONTENT:{id}"),
            "file_type": "application/pdf",
            "type": "file"
        }))
    }
}

struct CompletionResponder {
    invoices: HashMap<String, MockInvoice>,
    failing: HashSet<String>,
}

impl Respond for CompletionResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = match request.body_json() {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let prompt = body["messages"][1]["content"].as_str().unwrap_or_default();
        let stem = prompt
            .split("CONTENT:file-")
            .nth(1)
            .and_then(|rest| rest.split(|c: char| c == '"' || c.is_whitespace()).next())
            .unwrap_or_default()
            .to_string();

        if self.failing.contains(&stem) {
            return ResponseTemplate::new(500).set_body_string("inference backend unavailable");
        }

        let content = match self.invoices.get(&stem) {
            Some(invoice) => json!({
                "发票代码": "N/A",
                "发票号码": invoice.number,
                "销方名称": "Example Seller Co., Ltd.",
                "购买方名称": "Example Buyer Co., Ltd.",
                "开票日期": invoice.date,
                "价税合计": invoice.total,
                "发票票种": "电子发票（普通发票）",
                "类别": invoice.category
            }),
            None => json!({ "发票号码": stem }),
        };

        ResponseTemplate::new(200).set_body_json(json!({
            "id": "cmpl-test",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content.to_string() },
                "finish_reason": "stop"
            }]
        }))
    }
}

/// Mock extraction API serving the given invoices
pub struct MockExtractionApi {
    pub server: MockServer,
}

impl MockExtractionApi {
    /// Start a server; completions for stems in `failing` answer HTTP 500
    pub async fn start(invoices: &[(&str, MockInvoice)], failing: &[&str]) -> Self {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .respond_with(UploadResponder)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/v1/files/[^/]+/content$"))
            .respond_with(ContentResponder)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(CompletionResponder {
                invoices: invoices
                    .iter()
                    .map(|(stem, invoice)| (stem.to_string(), invoice.clone()))
                    .collect(),
                failing: failing.iter().map(|s| s.to_string()).collect(),
            })
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path_regex(r"^/v1/files/[^/]+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "deleted": true })))
            .mount(&server)
            .await;

        Self { server }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Number of received requests with the given method whose path starts with `prefix`
    pub async fn count(&self, http_method: &str, prefix: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == http_method && r.url.path().starts_with(prefix))
            .count()
    }

    /// Paths of DELETE requests, sorted
    pub async fn deleted_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == "DELETE")
            .filter_map(|r| r.url.path().rsplit('/').next().map(str::to_string))
            .collect();
        ids.sort();
        ids
    }
}
