// SPDX-License-Identifier: Apache-2.0

use crate::ApiErrorCode;
use serde_json::{json, Value};

/// Routes served by the CapVisor service as `(method, path, requires_auth)`.
pub const ROUTES: [(&str, &str, bool); 10] = [
    ("get", "/healthz", false),
    ("get", "/openapi.json", false),
    ("post", "/api/auth/login", false),
    ("get", "/api/catalog", true),
    ("post", "/api/topics", true),
    ("post", "/api/skeleton", true),
    ("post", "/api/translate-prompt", true),
    ("post", "/api/image", true),
    ("post", "/api/score", true),
    ("get", "/api/logs", true),
];

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ApiErrorBody"}}}
    })
}

#[must_use]
pub fn openapi_v1_spec() -> Value {
    let error_codes: Vec<&str> = ApiErrorCode::ALL.iter().map(|c| c.as_str()).collect();
    let mut paths = serde_json::Map::new();
    for (method, path, requires_auth) in ROUTES {
        let mut responses = serde_json::Map::new();
        responses.insert("200".to_string(), json!({"description": "ok"}));
        if method == "post" {
            responses.insert("400".to_string(), error_response("invalid request"));
            responses.insert("413".to_string(), error_response("request body too large"));
        }
        if requires_auth {
            responses.insert("401".to_string(), error_response("missing or invalid bearer token"));
        }
        if path == "/api/auth/login" {
            responses.insert("401".to_string(), error_response("invalid credentials"));
        }
        if path == "/api/image" {
            responses.insert("502".to_string(), error_response("every image backend failed"));
        }
        let mut operation = json!({"responses": Value::Object(responses)});
        if requires_auth {
            operation["security"] = json!([{"bearerAuth": []}]);
        }
        paths.insert(path.to_string(), json!({ method: operation }));
    }

    json!({
      "openapi": "3.0.3",
      "info": {"title": "CapVisor API", "version": "v1"},
      "paths": Value::Object(paths),
      "components": {
        "securitySchemes": {
          "bearerAuth": {"type": "http", "scheme": "bearer", "bearerFormat": "JWT"}
        },
        "schemas": {
          "ApiErrorBody": {
            "type": "object",
            "required": ["error"],
            "properties": {"error": {"$ref": "#/components/schemas/ApiError"}}
          },
          "ApiError": {
            "type": "object",
            "required": ["code", "message", "details", "request_id"],
            "additionalProperties": false,
            "properties": {
              "code": {"type": "string", "enum": error_codes},
              "message": {"type": "string"},
              "details": {"type": "object"},
              "request_id": {"type": "string"}
            }
          }
        }
      }
    })
}
