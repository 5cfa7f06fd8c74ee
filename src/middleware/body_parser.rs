use crate::http::{Request, Response};
use crate::json::{self, Map, Value};
use crate::middleware::{Flow, Middleware};

/// Parses JSON and urlencoded form bodies into [`Request::json`].
///
/// A JSON body that fails to parse is answered with 400.
#[derive(Debug, Default, Clone, Copy)]
pub struct BodyParser;

impl BodyParser {
    pub fn new() -> Self {
        BodyParser
    }
}

impl Middleware for BodyParser {
    fn handle(&self, req: &mut Request, res: &mut Response) -> Flow {
        if req.body.is_empty() {
            return Flow::Continue;
        }
        let Some(content_type) = req.content_type().map(str::to_ascii_lowercase) else {
            return Flow::Continue;
        };

        if content_type.contains("application/json") {
            match json::parse_slice(&req.body) {
                Ok(value) => req.json = Some(value),
                Err(e) => {
                    tracing::debug!(path = %req.path, error = %e, "rejecting request body");
                    res.status(400)
                        .json_value(&Value::object().with("error", "Invalid JSON"));
                    return Flow::Halt;
                }
            }
        } else if content_type.contains("application/x-www-form-urlencoded") {
            let fields: Map = Request::parse_query(&req.body_str())
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect();
            req.json = Some(Value::Object(fields));
        }
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    fn parse(content_type: &str, body: &str) -> (Flow, Request, Response) {
        let mut req = Request::new(Method::POST, "/submit")
            .with_header("Content-Type", content_type)
            .with_body(body);
        let mut res = Response::new();
        let flow = BodyParser.handle(&mut req, &mut res);
        (flow, req, res)
    }

    #[test]
    fn parses_json_body() {
        let (flow, req, _) = parse("application/json; charset=utf-8", r#"{"name":"crest","tags":[1,2]}"#);
        assert_eq!(flow, Flow::Continue);
        let body = req.json().unwrap();
        assert_eq!(body["name"].as_str(), Some("crest"));
        assert_eq!(body["tags"].len(), 2);
    }

    #[test]
    fn invalid_json_is_400() {
        let (flow, req, res) = parse("application/json", "{\"name\":");
        assert_eq!(flow, Flow::Halt);
        assert!(req.json().is_none());
        assert_eq!(res.status_code(), 400);
        assert_eq!(res.body(), br#"{"error":"Invalid JSON"}"#);
    }

    #[test]
    fn parses_form_body() {
        let (flow, req, _) = parse("application/x-www-form-urlencoded", "user=j%C3%B6rg&note=hi+there&bare");
        assert_eq!(flow, Flow::Continue);
        let body = req.json().unwrap();
        assert_eq!(body["user"].as_str(), Some("jörg"));
        assert_eq!(body["note"].as_str(), Some("hi there"));
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn leaves_other_bodies_alone() {
        let (flow, req, _) = parse("text/plain", "{not json");
        assert_eq!(flow, Flow::Continue);
        assert!(req.json().is_none());
    }
}
