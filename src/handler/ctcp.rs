//! The CTCP responder: recognized requests and their reply strings.

use chrono::Utc;
use dispatch_proto::Ctcp;

const CLIENTINFO: &str = "ACTION CLIENTINFO DCC FINGER PING SOURCE TIME VERSION USERINFO";

/// Builds a reply to a recognized CTCP request, or `None` for anything
/// unrecognized (which is silently ignored, not errored).
pub fn respond(request: &Ctcp, nick: &str, realname: &str, version: &str, source: &str) -> Option<Ctcp> {
    let params = match request.command.as_str() {
        "CLIENTINFO" => CLIENTINFO.to_owned(),
        "FINGER" => format!("{} ({})", nick, realname),
        "VERSION" => version.to_owned(),
        "PING" => request.params.clone(),
        "SOURCE" => source.to_owned(),
        "TIME" => Utc::now().to_rfc3339(),
        "USERINFO" => format!("{} ({})", nick, realname),
        _ => return None,
    };

    Some(Ctcp { command: request.command.clone(), params })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clientinfo_lists_supported_commands() {
        let req = Ctcp { command: "CLIENTINFO".into(), params: String::new() };
        let reply = respond(&req, "ferris", "Ferris the Crab", "Dispatch 0.1", "https://example.test/dispatch").unwrap();
        assert_eq!(reply.params, CLIENTINFO);
    }

    #[test]
    fn ping_echoes_params() {
        let req = Ctcp { command: "PING".into(), params: "123456".into() };
        let reply = respond(&req, "ferris", "Ferris the Crab", "Dispatch 0.1", "https://example.test/dispatch").unwrap();
        assert_eq!(reply.params, "123456");
    }

    #[test]
    fn userinfo_combines_nick_and_realname() {
        let req = Ctcp { command: "USERINFO".into(), params: String::new() };
        let reply = respond(&req, "ferris", "Ferris the Crab", "Dispatch 0.1", "https://example.test/dispatch").unwrap();
        assert_eq!(reply.params, "ferris (Ferris the Crab)");
    }

    #[test]
    fn source_reply_uses_configured_string() {
        let req = Ctcp { command: "SOURCE".into(), params: String::new() };
        let reply = respond(&req, "ferris", "Ferris the Crab", "Dispatch 0.1", "https://example.test/dispatch").unwrap();
        assert_eq!(reply.params, "https://example.test/dispatch");
    }

    #[test]
    fn unknown_request_is_ignored() {
        let req = Ctcp { command: "DCC".into(), params: String::new() };
        assert!(respond(&req, "ferris", "Ferris the Crab", "Dispatch 0.1", "https://example.test/dispatch").is_none());
    }
}
