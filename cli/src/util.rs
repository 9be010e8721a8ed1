use serde_json::json;

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", serde_json::to_string_pretty(&err).unwrap());
    std::process::exit(1);
}

/// Print the response body as pretty JSON and map the HTTP status to an
/// exit code: 0 success, 1 client error, 2 server error, 3 no connection.
pub async fn print_response(result: Result<reqwest::Response, reqwest::Error>) -> i32 {
    let resp = match result {
        Ok(resp) => resp,
        Err(e) => {
            let err = json!({
                "error": "connection_error",
                "message": format!("{e}"),
                "docs_hint": "Is the API server running? Check KOKORO_API_URL."
            });
            eprintln!("{}", serde_json::to_string_pretty(&err).unwrap());
            return 3;
        }
    };

    let status = resp.status().as_u16();
    let body: serde_json::Value = resp.json().await.unwrap_or(json!({"error": "unknown"}));
    let rendered = serde_json::to_string_pretty(&body).unwrap();

    if (200..300).contains(&status) {
        println!("{rendered}");
        0
    } else {
        eprintln!("{rendered}");
        if (400..500).contains(&status) { 1 } else { 2 }
    }
}
