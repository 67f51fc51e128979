//! Wire format: endpoints, command text, and response classification.

use crate::config::ConnectionConfig;
use crate::error::DriverError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use eyre::Result;
use serde_json::{Map, Value};

/// Name of the session cookie issued by `/connect`.
pub const SESSION_COOKIE: &str = "OSESSIONID";

/// A decoded record from a `result` array.
pub type Record = Map<String, Value>;

/// `GET` target that opens a session.
pub fn connect_url(config: &ConnectionConfig) -> String {
    format!("{}/connect/{}", config.base_url(), config.database)
}

/// `POST` target carrying a SQL command in its path.
pub fn command_url(config: &ConnectionConfig, command: &str) -> String {
    format!(
        "{}/command/{}/sql/{}",
        config.base_url(),
        config.database,
        encode_command(command)
    )
}

/// Percent-encode command text using query-component rules.
pub fn encode_command(command: &str) -> String {
    url::form_urlencoded::byte_serialize(command.as_bytes()).collect()
}

/// `Authorization` header value for HTTP Basic credentials.
pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

/// Pick the session token out of the `Set-Cookie` values of a connect reply.
///
/// Exactly one cookie must be set and it must be the session cookie.
/// Returns the `name=value` pair to echo back on later requests.
pub fn session_cookie(set_cookies: &[String]) -> Result<String> {
    let pairs: Vec<&str> = set_cookies
        .iter()
        .map(|c| c.split(';').next().unwrap_or("").trim())
        .filter(|pair| !pair.is_empty())
        .collect();

    match pairs.as_slice() {
        [pair] if pair.split('=').next() == Some(SESSION_COOKIE) => Ok(pair.to_string()),
        [] => Err(eyre::eyre!(DriverError::UnexpectedResponse(format!(
            "connected, but {} cookie not present in server response, wrong address?",
            SESSION_COOKIE
        )))),
        _ => Err(eyre::eyre!(DriverError::UnexpectedResponse(format!(
            "connected, but expected exactly one {} cookie, got: {}",
            SESSION_COOKIE,
            pairs.join(", ")
        )))),
    }
}

/// Classify a command response body.
///
/// `{"errors": [...]}` becomes a command error, `{"result": [...]}` the list of
/// records, anything else a decode error that carries the body.
pub fn parse_command_response(command: &str, body: &str) -> Result<Vec<Record>> {
    let decoded: Value = serde_json::from_str(body)
        .map_err(|e| eyre::eyre!(DriverError::decode(format!("invalid JSON: {}", e), body)))?;

    if let Some(errors) = decoded.get("errors") {
        let first = errors
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_object)
            .ok_or_else(|| eyre::eyre!(DriverError::decode("malformed errors list", body)))?;
        return Err(eyre::eyre!(DriverError::Command {
            command: command.to_string(),
            reason: field_text(first, "reason"),
            content: field_text(first, "content"),
        }));
    }

    let result = decoded
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| eyre::eyre!(DriverError::decode("no result list in response", body)))?;

    result
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            entry
                .as_object()
                .cloned()
                .ok_or_else(|| eyre::eyre!(DriverError::decode(format!("result entry {} is not an object", i), body)))
        })
        .collect()
}

fn field_text(obj: &Record, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Render a value in the database's literal syntax.
pub fn to_odb_repr(value: &Value) -> String {
    value.to_string()
}

/// `k=v, k2=v2` from assignments.
fn assignments<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a Value)>) -> String {
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, to_odb_repr(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `[#1:1,#1:2]` target literal.
pub fn rid_list(rids: &[String]) -> String {
    format!("[{}]", rids.join(","))
}

/// `SELECT FROM <target> [<params>] [LIMIT n]`.
pub fn select_command(target: &str, params: &str, limit: Option<usize>) -> String {
    let mut text = format!("SELECT FROM {}", target);
    let params = params.trim();
    if !params.is_empty() {
        text.push(' ');
        text.push_str(params);
    }
    if let Some(n) = limit.filter(|n| *n > 0) {
        text.push_str(&format!(" LIMIT {}", n));
    }
    text
}

/// `CREATE VERTEX <class> [SET ...]`.
pub fn create_vertex_command(class: &str, props: &Record) -> String {
    with_set(format!("CREATE VERTEX {}", class), props)
}

/// `CREATE EDGE <class> FROM <from> TO <to> [SET ...]`.
pub fn create_edge_command(class: &str, from: &str, to: &str, props: &Record) -> String {
    with_set(format!("CREATE EDGE {} FROM {} TO {}", class, from, to), props)
}

fn with_set(mut text: String, props: &Record) -> String {
    if !props.is_empty() {
        text.push_str(" SET ");
        text.push_str(&assignments(props.iter().map(|(k, v)| (k.as_str(), v))));
    }
    text
}

/// `UPDATE <rid> [SET ...] [REMOVE ...] RETURN AFTER @version`.
pub fn update_command(rid: &str, set: &[(String, Value)], remove: &[String]) -> String {
    let mut text = format!("UPDATE {}", rid);
    if !set.is_empty() {
        text.push_str(" SET ");
        text.push_str(&assignments(set.iter().map(|(k, v)| (k.as_str(), v))));
    }
    if !remove.is_empty() {
        text.push_str(" REMOVE ");
        text.push_str(&remove.join(", "));
    }
    text.push_str(" RETURN AFTER @version");
    text
}

/// `DELETE VERTEX|EDGE r1,r2`.
pub fn delete_command(kind: &str, rids: &[&str]) -> String {
    format!("DELETE {} {}", kind, rids.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn code(report: eyre::Report) -> DriverError {
        report.downcast::<DriverError>().unwrap()
    }

    #[test]
    fn test_command_url_escapes_sql() {
        let config = ConnectionConfig::new("localhost", "demo", "admin", "admin");
        let url = command_url(&config, "SELECT FROM V WHERE name = \"Sue\"");
        assert_eq!(
            url,
            "http://localhost:2480/command/demo/sql/SELECT+FROM+V+WHERE+name+%3D+%22Sue%22"
        );
    }

    #[test]
    fn test_basic_auth() {
        assert_eq!(basic_auth("admin", "admin"), "Basic YWRtaW46YWRtaW4=");
    }

    #[test]
    fn test_session_cookie_single() {
        let cookie = session_cookie(&["OSESSIONID=abc123; Path=/; HttpOnly".to_string()]).unwrap();
        assert_eq!(cookie, "OSESSIONID=abc123");
    }

    #[test]
    fn test_session_cookie_none() {
        let err = code(session_cookie(&[]).unwrap_err());
        assert!(matches!(err, DriverError::UnexpectedResponse(_)));
    }

    #[test]
    fn test_session_cookie_two() {
        let cookies = vec!["OSESSIONID=a; Path=/".to_string(), "OSESSIONID=b; Path=/".to_string()];
        let err = code(session_cookie(&cookies).unwrap_err());
        assert!(matches!(err, DriverError::UnexpectedResponse(_)));
    }

    #[test]
    fn test_session_cookie_wrong_name() {
        let err = code(session_cookie(&["JSESSIONID=a".to_string()]).unwrap_err());
        assert!(matches!(err, DriverError::UnexpectedResponse(_)));
    }

    #[test]
    fn test_parse_result() {
        let records = parse_command_response("SELECT", r##"{"result":[{"@rid":"#9:0"},{"@rid":"#9:1"}]}"##).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["@rid"], json!("#9:1"));
    }

    #[test]
    fn test_parse_errors() {
        let body = r#"{"errors":[{"code":500,"reason":500,"content":"Class 'Nope' was not found"}]}"#;
        match code(parse_command_response("SELECT FROM Nope", body).unwrap_err()) {
            DriverError::Command {
                command,
                reason,
                content,
            } => {
                assert_eq!(command, "SELECT FROM Nope");
                assert_eq!(reason, "500");
                assert_eq!(content, "Class 'Nope' was not found");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_parse_neither_shape() {
        match code(parse_command_response("SELECT", r#"{"foo":[1]}"#).unwrap_err()) {
            DriverError::Decode { body, .. } => assert_eq!(body, r#"{"foo":[1]}"#),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_parse_malformed_errors() {
        let err = code(parse_command_response("SELECT", r#"{"errors":"boom"}"#).unwrap_err());
        assert!(matches!(err, DriverError::Decode { .. }));
    }

    #[test]
    fn test_parse_non_object_entry() {
        let err = code(parse_command_response("SELECT", r#"{"result":[{"a":1}, 7]}"#).unwrap_err());
        assert!(matches!(err, DriverError::Decode { .. }));
    }

    #[test]
    fn test_parse_not_json() {
        let err = code(parse_command_response("SELECT", "<html>").unwrap_err());
        assert!(matches!(err, DriverError::Decode { .. }));
    }

    #[test]
    fn test_select_command() {
        assert_eq!(select_command("Gopher", "", None), "SELECT FROM Gopher");
        assert_eq!(
            select_command("Gopher", "WHERE name = \"Sue\"", Some(1)),
            "SELECT FROM Gopher WHERE name = \"Sue\" LIMIT 1"
        );
        assert_eq!(select_command("#9:0", " ", Some(0)), "SELECT FROM #9:0");
    }

    #[test]
    fn test_create_edge_command() {
        let mut props = Record::new();
        props.insert("howmuch".to_string(), json!(111));
        props.insert("note".to_string(), json!("lunch"));
        assert_eq!(
            create_edge_command("owes", "#9:0", "#9:1", &props),
            "CREATE EDGE owes FROM #9:0 TO #9:1 SET howmuch=111, note=\"lunch\""
        );
    }

    #[test]
    fn test_update_command_remove_only() {
        assert_eq!(
            update_command("#9:0", &[], &["a".to_string(), "b".to_string()]),
            "UPDATE #9:0 REMOVE a, b RETURN AFTER @version"
        );
    }

    #[test]
    fn test_delete_and_rid_list() {
        assert_eq!(delete_command("EDGE", &["#10:0", "#10:1"]), "DELETE EDGE #10:0,#10:1");
        assert_eq!(rid_list(&["#10:0".to_string(), "#10:1".to_string()]), "[#10:0,#10:1]");
    }
}
