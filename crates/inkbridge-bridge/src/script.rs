// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rendering host → content calls as script expressions.
//
// WebViews only offer "evaluate this JavaScript" in the host → content
// direction, so every `ContentCall` becomes one expression statement with the
// JSON payload embedded as a literal.

use inkbridge_core::error::{InkbridgeError, Result};
use inkbridge_core::types::{ScriptStyle, channels};

use crate::envelope::ContentCall;

/// Global the content bundle installs its dispatcher under.
pub const CONTENT_ENTRY_POINT: &str = "window.inkbridge.receive";

/// Global the content bundle posts envelopes to the host through.
pub const CONTENT_POST: &str = "window.inkbridge.post";

/// Render `call` as a statement ready for `evaluateJavascript`.
pub fn render(call: &ContentCall, style: ScriptStyle) -> Result<String> {
    match style {
        ScriptStyle::Envelope => {
            let json = serde_json::to_string(call)?;
            Ok(format!("{CONTENT_ENTRY_POINT}({});", js_safe(&json)))
        }
        ScriptStyle::LegacyGlobals => match call {
            ContentCall::Invoke { name, payload } => {
                check_identifier(name)?;
                match payload {
                    Some(json) => Ok(format!("{name}({});", json_literal(json)?)),
                    None => Ok(format!("{name}();")),
                }
            }
            ContentCall::HookResponse { channel, payload, .. } => {
                let hook = channels::hook_response_name(channel);
                check_identifier(&hook)?;
                Ok(format!("window.{hook}({});", json_literal(payload)?))
            }
        },
    }
}

/// Decode a statement produced by [`render`], in either style. Returns
/// `None` for any other script.
pub fn parse(source: &str) -> Option<ContentCall> {
    let body = source.trim().strip_suffix(");")?;
    if let Some(json) = body
        .strip_prefix(CONTENT_ENTRY_POINT)
        .and_then(|rest| rest.strip_prefix('('))
    {
        return serde_json::from_str(json).ok();
    }

    let (callee, args) = body.split_once('(')?;
    let payload = if args.is_empty() {
        None
    } else {
        Some(serde_json::from_str::<serde_json::Value>(args).ok()?.to_string())
    };
    match callee.strip_prefix("window.") {
        Some(hook) => {
            check_identifier(hook).ok()?;
            let channel = channels::channel_for_hook(hook)?;
            Some(ContentCall::hook_response(channel, None, payload?))
        }
        None => {
            check_identifier(callee).ok()?;
            Some(ContentCall::invoke(callee, payload))
        }
    }
}

/// Bootstrap that forwards the content's `console.*` output to the host on
/// the content-logs channel, keeping the native console behaviour.
pub fn console_pipe() -> String {
    format!(
        "(function(){{\
['debug','log','info','warn','error'].forEach(function(level){{\
var native=console[level];\
console[level]=function(){{\
var args=Array.prototype.slice.call(arguments);\
try{{{CONTENT_POST}({{channel:'{channel}',payload:JSON.stringify({{level:level,args:args}})}});}}catch(e){{}}\
native.apply(console,arguments);}};}});}})();",
        channel = channels::CONTENT_LOGS
    )
}

/// Quote arbitrary text as a JavaScript string literal.
pub fn string_literal(text: &str) -> Result<String> {
    Ok(js_safe(&serde_json::to_string(text)?))
}

/// Re-encode `json` compactly so only well-formed JSON is ever spliced into
/// a script.
fn json_literal(json: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| InkbridgeError::MalformedMessage(format!("payload is not JSON: {e}")))?;
    Ok(js_safe(&serde_json::to_string(&value)?))
}

/// U+2028/U+2029 are legal in JSON strings but terminate lines in older
/// JavaScript engines. `</` is broken up so a script spliced into a page
/// cannot close its own `<script>` element. Outside string literals JSON
/// never contains either, so the result is still the same value.
fn js_safe(json: &str) -> String {
    json.replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
        .replace("</", "<\\/")
}

fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        Ok(())
    } else {
        Err(InkbridgeError::MalformedMessage(format!(
            "`{name}` is not a script identifier"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkbridge_core::types::RequestId;

    #[test]
    fn legacy_set_init_state_embeds_literal() {
        let call = ContentCall::invoke("setInitState", Some(r#"{ "ops": [ {"insert":"demo document\n"} ] }"#.into()));
        let script = render(&call, ScriptStyle::LegacyGlobals).unwrap();
        assert_eq!(script, r#"setInitState({"ops":[{"insert":"demo document\n"}]});"#);
    }

    #[test]
    fn legacy_fetch_reply_uses_historical_hook() {
        let call = ContentCall::hook_response(
            channels::FETCH_DOC_ON_NETWORK_RECONNECT,
            None,
            r#"{"content":{"ops":[]},"timestamp":-1}"#.into(),
        );
        let script = render(&call, ScriptStyle::LegacyGlobals).unwrap();
        assert_eq!(
            script,
            r#"window.fetchDocOnReconnectHookResponse({"content":{"ops":[]},"timestamp":-1});"#
        );
    }

    #[test]
    fn envelope_style_goes_through_entry_point() {
        let call = ContentCall::hook_response("loadComments", Some(RequestId::new()), "[]".into());
        let script = render(&call, ScriptStyle::Envelope).unwrap();
        assert!(script.starts_with("window.inkbridge.receive({"));
        assert!(script.contains(r#""kind":"hookResponse""#));
        assert!(script.ends_with(");"));
    }

    #[test]
    fn line_separators_are_escaped() {
        let call = ContentCall::invoke("setInitState", Some("{\"ops\":[{\"insert\":\"a\u{2028}b\"}]}".into()));
        let script = render(&call, ScriptStyle::LegacyGlobals).unwrap();
        assert!(!script.contains('\u{2028}'));
        assert!(script.contains("\\u2028"));
    }

    #[test]
    fn string_literal_quotes_css() {
        let literal = string_literal("body { content: \"\u{2029}\"; }\n").unwrap();
        assert_eq!(literal, r#""body { content: \"\u2029\"; }\n""#);
    }

    #[test]
    fn closing_tags_cannot_end_the_script() {
        let call = ContentCall::invoke("setInitState", Some(r#"{"ops":[{"insert":"</script><b>x\n"}]}"#.into()));
        let script = render(&call, ScriptStyle::LegacyGlobals).unwrap();
        assert!(!script.contains("</"));
        assert_eq!(script, r#"setInitState({"ops":[{"insert":"<\/script><b>x\n"}]});"#);

        let literal = string_literal("p::after { content: \"</style>\"; }").unwrap();
        assert!(!literal.contains("</"));
        let back: String = serde_json::from_str(&literal).unwrap();
        assert_eq!(back, "p::after { content: \"</style>\"; }");
    }

    #[test]
    fn rendered_calls_decode_in_both_styles() {
        let seed = ContentCall::invoke("setInitState", Some("{\"ops\":[{\"insert\":\"</b>\u{2028}\\n\"}]}".into()));
        let reply = ContentCall::hook_response(channels::FETCH_DOC_ON_NETWORK_RECONNECT, Some(RequestId::new()), "{}".into());
        for call in [seed.clone(), reply.clone(), ContentCall::stop_sync()] {
            assert_eq!(parse(&render(&call, ScriptStyle::Envelope).unwrap()), Some(call));
        }

        assert_eq!(parse(&render(&seed, ScriptStyle::LegacyGlobals).unwrap()), Some(seed));
        assert_eq!(parse("startSync();"), Some(ContentCall::start_sync()));
        // Legacy hooks carry no request id.
        assert_eq!(
            parse(&render(&reply, ScriptStyle::LegacyGlobals).unwrap()),
            Some(ContentCall::hook_response(channels::FETCH_DOC_ON_NETWORK_RECONNECT, None, "{}".into()))
        );
    }

    #[test]
    fn other_scripts_do_not_decode() {
        assert_eq!(parse("/* codox */"), None);
        assert_eq!(parse("window.alert(1);"), None);
        assert_eq!(parse(&console_pipe()), None);
    }

    #[test]
    fn console_pipe_posts_on_log_channel() {
        let bootstrap = console_pipe();
        assert!(bootstrap.contains(CONTENT_POST));
        assert!(bootstrap.contains("channel:'jsLogsPipeHandler'"));
        assert!(bootstrap.ends_with("})();"));
    }

    #[test]
    fn injected_name_is_rejected() {
        let call = ContentCall::invoke("alert(1);stopSync", None);
        assert!(render(&call, ScriptStyle::LegacyGlobals).is_err());
    }

    #[test]
    fn non_json_payload_is_rejected() {
        let call = ContentCall::invoke("setInitState", Some("alert(1)".into()));
        assert!(render(&call, ScriptStyle::LegacyGlobals).is_err());
    }
}
