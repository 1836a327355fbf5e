use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, Url};
use tracing::{debug, info, warn};

use spotlight_core::config::ToolsConfig;
use spotlight_core::error::{Result, SpotlightError};
use spotlight_core::payload::{AuthConfig, HttpExecutionConfig, Vault};
use spotlight_core::types::{ToolDefinition, ToolErrorKind, ToolOutcome};

use crate::preview::{bounded_preview, render_body};

const REDACTED: &str = "[REDACTED]";

/// Schema sent to the model when a tool declares no parameters.
pub fn empty_parameter_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}, "required": []})
}

/// A remote tool described by an HTTP execution config.
///
/// Everything that can be checked ahead of time is checked in
/// [`HttpTool::from_config`]; the vault is read only when the tool runs.
pub struct HttpTool {
    name: String,
    description: String,
    schema: serde_json::Value,
    validator: jsonschema::Validator,
    url: Url,
    method: Method,
    timeout: Duration,
    auth: Option<(AuthConfig, HeaderName)>,
    vault: Arc<Vault>,
    http: reqwest::Client,
    preview_max_chars: usize,
}

impl std::fmt::Debug for HttpTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTool")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpTool {
    pub fn from_config(
        name: &str,
        description: Option<&str>,
        parameter_schema: &serde_json::Value,
        exec: &HttpExecutionConfig,
        vault: Arc<Vault>,
        http: reqwest::Client,
        tools_config: &ToolsConfig,
    ) -> Result<Self> {
        let schema = match parameter_schema {
            serde_json::Value::Null => empty_parameter_schema(),
            serde_json::Value::Object(map) if map.is_empty() => empty_parameter_schema(),
            serde_json::Value::Object(_) => parameter_schema.clone(),
            _ => {
                return Err(SpotlightError::Config(format!(
                    "tool '{}': parameter_schema must be a JSON object",
                    name
                )))
            }
        };
        let validator = jsonschema::Validator::new(&schema).map_err(|e| {
            SpotlightError::Config(format!("tool '{}': invalid parameter_schema: {}", name, e))
        })?;

        if exec.url.trim().is_empty() {
            return Err(SpotlightError::Config(format!(
                "tool '{}': execution_config.url is required",
                name
            )));
        }
        let url = Url::parse(exec.url.trim()).map_err(|_| {
            SpotlightError::Config(format!("tool '{}': execution_config.url is not a valid URL", name))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SpotlightError::Config(format!(
                "tool '{}': execution_config.url must use http or https",
                name
            )));
        }

        let method = match exec.method.trim().to_uppercase().as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "PATCH" => Method::PATCH,
            "DELETE" => Method::DELETE,
            other => {
                return Err(SpotlightError::Config(format!(
                    "tool '{}': unsupported HTTP method '{}'",
                    name, other
                )))
            }
        };

        let auth = match &exec.auth_config {
            Some(auth) => {
                let header = HeaderName::from_bytes(auth.target.as_bytes()).map_err(|_| {
                    SpotlightError::Config(format!(
                        "tool '{}': auth_config.target is not a valid header name",
                        name
                    ))
                })?;
                Some((auth.clone(), header))
            }
            None => None,
        };

        let timeout_secs = exec
            .timeout_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(tools_config.http_timeout_secs);

        Ok(Self {
            name: name.to_string(),
            description: description.unwrap_or_default().to_string(),
            schema,
            validator,
            url,
            method,
            timeout: Duration::from_secs(timeout_secs),
            auth,
            vault,
            http,
            preview_max_chars: tools_config.preview_max_chars,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.schema.clone(),
        }
    }

    /// Run the tool. Every failure is reported as an error outcome.
    pub async fn invoke(&self, args: serde_json::Value) -> ToolOutcome {
        if !self.validator.is_valid(&args) {
            let errors: Vec<String> = self
                .validator
                .iter_errors(&args)
                .map(|e| e.to_string())
                .collect();
            return ToolOutcome::error(
                ToolErrorKind::InvalidArguments,
                format!("tool '{}': invalid arguments: {}", self.name, errors.join("; ")),
            );
        }

        let mut req = self
            .http
            .request(self.method.clone(), self.url.clone())
            .timeout(self.timeout);

        if self.method == Method::GET {
            req = req.query(&query_pairs(&args));
        } else {
            req = req.json(&args);
        }

        let mut injected: Option<&str> = None;
        if let Some((auth, header)) = &self.auth {
            // Read once per call so nothing outlives the request
            let Some(secret) = self.vault.get(&auth.source) else {
                warn!(tool = %self.name, "Auth secret missing from vault");
                return ToolOutcome::error(
                    ToolErrorKind::SecretMissing,
                    format!("tool '{}': required credential is not in the vault", self.name),
                );
            };
            let Ok(mut value) = HeaderValue::from_str(secret) else {
                return ToolOutcome::error(
                    ToolErrorKind::Execution,
                    format!("tool '{}': credential is not a valid header value", self.name),
                );
            };
            value.set_sensitive(true);
            req = req.header(header.clone(), value);
            injected = Some(secret);
            debug!(tool = %self.name, header = %header, "Injected auth header");
        }

        info!(tool = %self.name, method = %self.method, "Invoking HTTP tool");

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) => return self.transport_outcome(&e),
        };

        let status = response.status();
        if !status.is_success() {
            warn!(tool = %self.name, status = status.as_u16(), "HTTP tool returned error status");
            let class = if status.is_client_error() {
                "a client error (4xx)"
            } else if status.is_server_error() {
                "a server error (5xx)"
            } else {
                "an unexpected status"
            };
            return ToolOutcome::error(
                ToolErrorKind::UpstreamStatus {
                    status_code: status.as_u16(),
                },
                format!("tool '{}' returned {}", self.name, class),
            );
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return self.transport_outcome(&e),
        };

        let rendered = match injected {
            Some(secret) => redact(&render_body(&redact(&body, secret)), secret),
            None => render_body(&body),
        };
        let (preview, truncated) = bounded_preview(&rendered, self.preview_max_chars);
        info!(tool = %self.name, status = status.as_u16(), truncated, "HTTP tool succeeded");
        ToolOutcome::Success { preview, truncated }
    }

    fn transport_outcome(&self, e: &reqwest::Error) -> ToolOutcome {
        if e.is_timeout() {
            warn!(tool = %self.name, timeout_secs = self.timeout.as_secs(), "HTTP tool timed out");
            ToolOutcome::error(
                ToolErrorKind::Timeout,
                format!("tool '{}' timed out after {}s", self.name, self.timeout.as_secs()),
            )
        } else if e.is_connect() {
            warn!(tool = %self.name, "HTTP tool unreachable");
            ToolOutcome::error(
                ToolErrorKind::Transport,
                format!("tool '{}' is unreachable", self.name),
            )
        } else {
            warn!(tool = %self.name, "HTTP tool request failed");
            ToolOutcome::error(
                ToolErrorKind::Transport,
                format!("tool '{}' request failed", self.name),
            )
        }
    }
}

/// Upstreams may echo the injected credential back in the body.
fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, REDACTED)
}

/// Flatten top-level arguments into query pairs. Strings go in verbatim,
/// other values as JSON text, nulls are dropped.
fn query_pairs(args: &serde_json::Value) -> Vec<(String, String)> {
    match args {
        serde_json::Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let v = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tools_config() -> ToolsConfig {
        ToolsConfig {
            http_timeout_secs: 5,
            preview_max_chars: 4_000,
        }
    }

    fn exec(url: String) -> HttpExecutionConfig {
        HttpExecutionConfig {
            url,
            method: "GET".into(),
            timeout_secs: None,
            auth_config: None,
        }
    }

    fn weather_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"]
        })
    }

    fn tool(exec: &HttpExecutionConfig, vault: Vault) -> HttpTool {
        HttpTool::from_config(
            "weather",
            Some("Look up weather"),
            &weather_schema(),
            exec,
            Arc::new(vault),
            reqwest::Client::new(),
            &tools_config(),
        )
        .unwrap()
    }

    fn vault_with_key() -> Vault {
        [("weather_key".to_string(), "s3cr3t-value".to_string())]
            .into_iter()
            .collect()
    }

    #[tokio::test]
    async fn test_get_with_query_and_injected_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/now"))
            .and(query_param("city", "Paris"))
            .and(header("X-Api-Key", "s3cr3t-value"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"temp": 21})))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = exec(format!("{}/now", server.uri()));
        cfg.auth_config = Some(AuthConfig {
            source: "weather_key".into(),
            target: "X-Api-Key".into(),
        });
        let outcome = tool(&cfg, vault_with_key())
            .invoke(serde_json::json!({"city": "Paris"}))
            .await;
        assert_eq!(outcome, ToolOutcome::success(r#"{"temp":21}"#));
    }

    #[tokio::test]
    async fn test_echoed_secret_is_redacted_from_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/headers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"headers": {"X-Api-Key": "s3cr3t-value"}}),
            ))
            .mount(&server)
            .await;

        let mut cfg = exec(format!("{}/headers", server.uri()));
        cfg.auth_config = Some(AuthConfig {
            source: "weather_key".into(),
            target: "X-Api-Key".into(),
        });
        let outcome = tool(&cfg, vault_with_key())
            .invoke(serde_json::json!({"city": "Paris"}))
            .await;
        assert_eq!(
            outcome,
            ToolOutcome::success(r#"{"headers":{"X-Api-Key":"[REDACTED]"}}"#)
        );

        let frame = spotlight_core::event::CanonicalEvent::tool_result("weather", &outcome)
            .to_payload("trace-1")
            .to_string();
        assert!(!frame.contains("s3cr3t-value"));
        assert!(!outcome.content_for_model().contains("s3cr3t-value"));
    }

    #[tokio::test]
    async fn test_echoed_secret_in_text_body_is_redacted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("key=s3cr3t-value ok"))
            .mount(&server)
            .await;

        let mut cfg = exec(server.uri());
        cfg.auth_config = Some(AuthConfig {
            source: "weather_key".into(),
            target: "Authorization".into(),
        });
        let outcome = tool(&cfg, vault_with_key())
            .invoke(serde_json::json!({"city": "Paris"}))
            .await;
        assert_eq!(outcome, ToolOutcome::success(r#"{"text":"key=[REDACTED] ok"}"#));
    }

    #[tokio::test]
    async fn test_post_sends_json_body_and_wraps_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({"city": "Oslo"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("cold"))
            .mount(&server)
            .await;

        let mut cfg = exec(server.uri());
        cfg.method = "post".into();
        let outcome = tool(&cfg, Vault::default())
            .invoke(serde_json::json!({"city": "Oslo"}))
            .await;
        assert_eq!(outcome, ToolOutcome::success(r#"{"text":"cold"}"#));
    }

    #[tokio::test]
    async fn test_missing_secret_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut cfg = exec(server.uri());
        cfg.auth_config = Some(AuthConfig {
            source: "absent".into(),
            target: "Authorization".into(),
        });
        let outcome = tool(&cfg, Vault::default())
            .invoke(serde_json::json!({"city": "Paris"}))
            .await;
        match outcome {
            ToolOutcome::Error(e) => assert_eq!(e.kind, ToolErrorKind::SecretMissing),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_schema_violation_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = tool(&exec(server.uri()), Vault::default())
            .invoke(serde_json::json!({"town": 3}))
            .await;
        match outcome {
            ToolOutcome::Error(e) => assert_eq!(e.kind, ToolErrorKind::InvalidArguments),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upstream_status_message_has_no_secret() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("key s3cr3t-value rejected"))
            .mount(&server)
            .await;

        let mut cfg = exec(server.uri());
        cfg.auth_config = Some(AuthConfig {
            source: "weather_key".into(),
            target: "X-Api-Key".into(),
        });
        let outcome = tool(&cfg, vault_with_key())
            .invoke(serde_json::json!({"city": "Paris"}))
            .await;
        let ToolOutcome::Error(e) = outcome else {
            panic!("expected error");
        };
        assert_eq!(e.kind, ToolErrorKind::UpstreamStatus { status_code: 503 });
        assert_eq!(e.message, "tool 'weather' returned a server error (5xx)");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        // Port 9 on localhost is not listening
        let outcome = tool(&exec("http://127.0.0.1:9/now".into()), Vault::default())
            .invoke(serde_json::json!({"city": "Paris"}))
            .await;
        let ToolOutcome::Error(e) = outcome else {
            panic!("expected error");
        };
        assert_eq!(e.kind, ToolErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let mut cfg = exec(server.uri());
        cfg.timeout_secs = Some(1);
        let outcome = tool(&cfg, Vault::default())
            .invoke(serde_json::json!({"city": "Paris"}))
            .await;
        let ToolOutcome::Error(e) = outcome else {
            panic!("expected error");
        };
        assert_eq!(e.kind, ToolErrorKind::Timeout);
        assert_eq!(e.message, "tool 'weather' timed out after 1s");
    }

    #[tokio::test]
    async fn test_large_body_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(50)))
            .mount(&server)
            .await;

        let mut config = tools_config();
        config.preview_max_chars = 20;
        let http_tool = HttpTool::from_config(
            "dump",
            None,
            &serde_json::Value::Null,
            &exec(server.uri()),
            Arc::new(Vault::default()),
            reqwest::Client::new(),
            &config,
        )
        .unwrap();
        assert_eq!(http_tool.definition().input_schema, empty_parameter_schema());

        let outcome = http_tool.invoke(serde_json::json!({})).await;
        let ToolOutcome::Success { preview, truncated } = outcome else {
            panic!("expected success");
        };
        assert!(truncated);
        assert!(preview.starts_with(r#"{"text":"xxxxxxxxxx"#));
        assert!(preview.ends_with("…[truncated 41 chars]"));
    }

    #[test]
    fn test_config_errors() {
        let vault = Arc::new(Vault::default());
        let build = |exec: &HttpExecutionConfig, schema: &serde_json::Value| {
            HttpTool::from_config(
                "t",
                None,
                schema,
                exec,
                vault.clone(),
                reqwest::Client::new(),
                &tools_config(),
            )
        };
        let schema = weather_schema();

        assert!(build(&exec(String::new()), &schema).is_err());
        assert!(build(&exec("not a url".into()), &schema).is_err());
        assert!(build(&exec("ftp://example.com".into()), &schema).is_err());

        let mut bad_method = exec("https://example.com".into());
        bad_method.method = "TRACE".into();
        assert!(build(&bad_method, &schema).is_err());

        let mut bad_header = exec("https://example.com".into());
        bad_header.auth_config = Some(AuthConfig {
            source: "k".into(),
            target: "bad header".into(),
        });
        assert!(build(&bad_header, &schema).is_err());

        let bad_schema = serde_json::json!({"type": 12});
        let err = build(&exec("https://example.com".into()), &bad_schema).unwrap_err();
        assert!(err.is_config());

        assert!(build(&exec("https://example.com".into()), &serde_json::json!("x")).is_err());
    }
}
