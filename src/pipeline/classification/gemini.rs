use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::prompt::CLASSIFICATION_INSTRUCTION;
use super::types::RemoteClassifier;
use super::ClassificationError;
use crate::pipeline::media::MediaType;

/// Connection settings for the Gemini API.
#[derive(Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Gemini HTTP client for remote classification.
///
/// Images are sent inline. PDFs go through the Files API: upload, reference
/// by URI in the generate call, then delete.
pub struct GeminiClient {
    settings: GeminiSettings,
    client: reqwest::blocking::Client,
}

// ── Wire types ──────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        inline_data: InlineData<'a>,
    },
    File {
        file_data: FileData<'a>,
    },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    name: String,
    uri: String,
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Result<Self, ClassificationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ClassificationError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            settings: GeminiSettings {
                base_url: settings.base_url.trim_end_matches('/').to_string(),
                ..settings
            },
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url, self.settings.model
        )
    }

    fn transport_error(&self, e: reqwest::Error) -> ClassificationError {
        if e.is_connect() {
            ClassificationError::Http(format!("Cannot reach classifier at {}", self.settings.base_url))
        } else if e.is_timeout() {
            ClassificationError::Http(format!(
                "Request timed out after {}s",
                self.settings.timeout_secs
            ))
        } else {
            ClassificationError::Http(e.to_string())
        }
    }

    fn generate(&self, parts: Vec<Part<'_>>) -> Result<String, ClassificationError> {
        let body = GenerateRequest {
            contents: [Content { parts }],
        };

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.settings.api_key)
            .json(&body)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ClassificationError::ClassifierCall {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| ClassificationError::Http(format!("Unreadable classifier reply: {e}")))?;

        first_candidate_text(parsed)
    }

    fn classify_image(&self, content: &[u8], media: &MediaType) -> Result<String, ClassificationError> {
        if !media.is_classifiable_image() {
            return Err(ClassificationError::UnsupportedImage(media.to_string()));
        }

        self.generate(vec![
            Part::Text {
                text: CLASSIFICATION_INSTRUCTION,
            },
            Part::Inline {
                inline_data: InlineData {
                    mime_type: media.as_str(),
                    data: BASE64.encode(content),
                },
            },
        ])
    }

    fn classify_document(&self, content: &[u8], media: &MediaType) -> Result<String, ClassificationError> {
        let uploaded = self.upload(content, media)?;
        tracing::debug!(name = %uploaded.name, "Document uploaded for classification");

        let mime_type = uploaded.mime_type.as_deref().unwrap_or(media.as_str());
        let result = self.generate(vec![
            Part::Text {
                text: CLASSIFICATION_INSTRUCTION,
            },
            Part::File {
                file_data: FileData {
                    mime_type,
                    file_uri: &uploaded.uri,
                },
            },
        ]);

        // Runs whatever the generate call returned; its own failure is only logged.
        if let Err(e) = self.delete_upload(&uploaded.name) {
            tracing::warn!(name = %uploaded.name, error = %e, "Failed to delete uploaded document");
        }

        result
    }

    fn upload(&self, content: &[u8], media: &MediaType) -> Result<UploadedFile, ClassificationError> {
        let url = format!("{}/upload/v1beta/files", self.settings.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.settings.api_key)
            .header("X-Goog-Upload-Protocol", "raw")
            .header(reqwest::header::CONTENT_TYPE, media.as_str())
            .body(content.to_vec())
            .send()
            .map_err(|e| ClassificationError::Upload(self.transport_error(e).to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ClassificationError::Upload(format!(
                "status {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: UploadResponse = response
            .json()
            .map_err(|e| ClassificationError::Upload(format!("Unreadable upload reply: {e}")))?;

        Ok(parsed.file)
    }

    fn delete_upload(&self, name: &str) -> Result<(), ClassificationError> {
        let url = format!("{}/v1beta/{}", self.settings.base_url, name);

        let response = self
            .client
            .delete(&url)
            .header("x-goog-api-key", &self.settings.api_key)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassificationError::ClassifierCall {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

impl RemoteClassifier for GeminiClient {
    fn classify(&self, content: &[u8], media: &MediaType) -> Result<String, ClassificationError> {
        let _span = tracing::info_span!(
            "gemini_classify",
            model = %self.settings.model,
            media_type = %media,
            size = content.len()
        )
        .entered();

        if media.is_pdf() {
            self.classify_document(content, media)
        } else if media.is_image() {
            self.classify_image(content, media)
        } else {
            Err(ClassificationError::UnsupportedImage(media.to_string()))
        }
    }
}

/// Concatenate the text parts of the first candidate.
fn first_candidate_text(response: GenerateResponse) -> Result<String, ClassificationError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(ClassificationError::EmptyResponse)?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ClassificationError::EmptyResponse);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "gemini-1.5-flash";
    const GENERATE_PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

    fn settings(base_url: &str) -> GeminiSettings {
        GeminiSettings {
            api_key: "test-key".into(),
            base_url: base_url.into(),
            model: MODEL.into(),
            timeout_secs: 5,
        }
    }

    fn reply(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }], "role": "model" }
            }]
        })
    }

    /// Blocking reqwest must not run on the async test runtime.
    async fn classify_blocking(
        base_url: String,
        content: &'static [u8],
        media: &'static str,
    ) -> Result<String, ClassificationError> {
        tokio::task::spawn_blocking(move || {
            let client = GeminiClient::new(settings(&base_url))?;
            client.classify(content, &MediaType::parse(media))
        })
        .await
        .unwrap()
    }

    #[test]
    fn constructor_trims_trailing_slash() {
        let client = GeminiClient::new(settings("http://localhost:9000/")).unwrap();
        assert_eq!(
            client.generate_url(),
            "http://localhost:9000/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(client.model(), MODEL);
    }

    #[test]
    fn settings_debug_redacts_key() {
        let debug = format!("{:?}", settings("http://localhost"));
        assert!(!debug.contains("test-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn first_candidate_parts_are_concatenated() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "{\"PII\":" }, { "text": "{}}" }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .unwrap();
        assert_eq!(first_candidate_text(response).unwrap(), "{\"PII\":{}}");
    }

    #[test]
    fn no_candidates_is_empty_response() {
        let response: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            first_candidate_text(response),
            Err(ClassificationError::EmptyResponse)
        ));

        let blocked: GenerateResponse =
            serde_json::from_value(json!({ "candidates": [{ "finishReason": "SAFETY" }] })).unwrap();
        assert!(matches!(
            first_candidate_text(blocked),
            Err(ClassificationError::EmptyResponse)
        ));
    }

    #[test]
    fn image_request_carries_instruction_and_inline_data() {
        let body = GenerateRequest {
            contents: [Content {
                parts: vec![
                    Part::Text {
                        text: CLASSIFICATION_INSTRUCTION,
                    },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: BASE64.encode(b"png"),
                        },
                    },
                ],
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        let parts = &value["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], CLASSIFICATION_INSTRUCTION);
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "cG5n");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn image_is_sent_inline() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path(GENERATE_PATH))
            .and(matchers::header("x-goog-api-key", "test-key"))
            .and(matchers::body_partial_json(json!({
                "contents": [{ "parts": [
                    { "text": CLASSIFICATION_INSTRUCTION },
                    { "inline_data": { "mime_type": "image/png", "data": "cG5n" } }
                ]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("{\"PII\":{}}")))
            .expect(1)
            .mount(&server)
            .await;

        let text = classify_blocking(server.uri(), b"png", "image/png").await.unwrap();
        assert_eq!(text, "{\"PII\":{}}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn server_error_maps_to_classifier_call() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = classify_blocking(server.uri(), b"png", "image/png").await.unwrap_err();
        match err {
            ClassificationError::ClassifierCall { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("expected ClassifierCall, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unsupported_image_is_rejected_without_a_request() {
        let server = MockServer::start().await;

        Mock::given(matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = classify_blocking(server.uri(), b"GIF89a", "image/gif").await.unwrap_err();
        assert!(matches!(err, ClassificationError::UnsupportedImage(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_server_is_http_error() {
        // Nothing listens on the discard port.
        let err = classify_blocking("http://127.0.0.1:9".into(), b"png", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, ClassificationError::Http(_)));
    }

    async fn mount_upload(server: &MockServer) {
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/upload/v1beta/files"))
            .and(matchers::header("X-Goog-Upload-Protocol", "raw"))
            .and(matchers::header("content-type", "application/pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "file": {
                    "name": "files/abc123",
                    "uri": "https://files.example/abc123",
                    "mimeType": "application/pdf"
                }
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_delete(server: &MockServer, status: u16) {
        Mock::given(matchers::method("DELETE"))
            .and(matchers::path("/v1beta/files/abc123"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pdf_is_uploaded_referenced_and_deleted() {
        let server = MockServer::start().await;
        mount_upload(&server).await;
        mount_delete(&server, 200).await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path(GENERATE_PATH))
            .and(matchers::body_partial_json(json!({
                "contents": [{ "parts": [
                    { "text": CLASSIFICATION_INSTRUCTION },
                    { "file_data": {
                        "mime_type": "application/pdf",
                        "file_uri": "https://files.example/abc123"
                    }}
                ]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("{\"PHI\":{}}")))
            .expect(1)
            .mount(&server)
            .await;

        let text = classify_blocking(server.uri(), b"%PDF-1.4", "application/pdf")
            .await
            .unwrap();
        assert_eq!(text, "{\"PHI\":{}}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn uploaded_pdf_is_deleted_when_generate_fails() {
        let server = MockServer::start().await;
        mount_upload(&server).await;
        mount_delete(&server, 200).await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let err = classify_blocking(server.uri(), b"%PDF-1.4", "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, ClassificationError::ClassifierCall { status: 500, .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_delete_does_not_mask_result() {
        let server = MockServer::start().await;
        mount_upload(&server).await;
        mount_delete(&server, 404).await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("{}")))
            .mount(&server)
            .await;

        let text = classify_blocking(server.uri(), b"%PDF-1.4", "application/pdf")
            .await
            .unwrap();
        assert_eq!(text, "{}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_upload_is_upload_error() {
        let server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path("/upload/v1beta/files"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad file"))
            .mount(&server)
            .await;

        let err = classify_blocking(server.uri(), b"%PDF-1.4", "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, ClassificationError::Upload(_)));
        assert!(err.is_transient());
    }
}
