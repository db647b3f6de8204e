//! Pure mapping from a parsed IRC message (plus the issuing Client's
//! identity and feature map) to the effects it produces: viewer events,
//! ChannelStore mutations, Store appends, and outbound replies.
//!
//! Kept free of I/O and of any `State`/`Store`/`ChannelStore` reference so
//! it stays trivially testable: given a message and a bit of connection
//! context, it returns the list of things that should happen.

pub mod ctcp;

use dispatch_proto::{Command, Ctcp, FeatureMap, Message, Mode, Response};

use crate::event::{
    ChannelListing, ChannelsEvent, ErrorEvent, JoinEvent, MessageEvent, ModeEvent, MotdEvent, NickEvent,
    NickFailEvent, PartEvent, PmEvent, QuitEvent, TopicEvent, UsersEvent, ViewerEvent, WhoisEvent,
};
use crate::store::model::MessageKind;

/// Connection-scoped facts the Handler needs but does not own.
pub struct HandlerContext<'a> {
    /// The network host this message arrived on.
    pub network: &'a str,
    /// This Client's current nick, to distinguish self-events from others.
    pub self_nick: &'a str,
    /// The network's accumulated ISUPPORT feature map.
    pub features: &'a FeatureMap,
    /// This network's configured CTCP VERSION reply.
    pub ctcp_version: &'a str,
    /// This network's configured CTCP SOURCE reply.
    pub ctcp_source: &'a str,
    /// This network's configured realname, used in CTCP FINGER/USERINFO.
    pub realname: &'a str,
}

/// Something that should happen as a result of processing one message.
#[derive(Debug)]
pub enum Effect {
    /// Broadcast an event to every viewer of this user's session.
    Emit(ViewerEvent),
    /// A user joined a channel in the live ChannelStore.
    ChannelStoreJoin { channel: String, user: String },
    /// A user parted a channel in the live ChannelStore.
    ChannelStorePart { channel: String, user: String },
    /// A user quit the network; remove from every channel.
    ChannelStoreQuit { user: String },
    /// A user changed nick; rename in every channel's member set.
    ChannelStoreRename { old: String, new: String },
    /// A channel's topic changed, possibly to `None`.
    ChannelStoreTopic { channel: String, topic: Option<String> },
    /// A channel's member list was replaced wholesale (NAMES assembly).
    ChannelStoreUsers { channel: String, users: Vec<String> },
    /// This Client joined `channel`; persist it in the Store.
    StoreJoinChannel { channel: String },
    /// This Client parted `channel` for good; remove it from the Store.
    StorePartChannel { channel: String },
    /// Append one entry to the message log under `(network, to)`.
    AppendMessage { to: String, from: String, content: String, kind: MessageKind },
    /// Send a reply back out on this Client (e.g. a CTCP NOTICE, a PONG).
    Reply(Command),
}

/// Processes one inbound message and returns the effects it produces. An
/// unrecognized command produces no effects.
pub fn handle(message: &Message, ctx: &HandlerContext) -> Vec<Effect> {
    let mut effects = Vec::new();
    let server = ctx.network.to_owned();

    match &message.command {
        Command::PRIVMSG(target, content) => handle_privmsg(message, target, content, ctx, &mut effects),
        Command::NOTICE(target, content) => handle_notice(message, target, content, &server, &mut effects),
        Command::NICK(new_nick) => handle_nick(message, new_nick, &server, ctx, &mut effects),
        Command::JOIN(channel, _) => handle_join(message, channel, &server, ctx, &mut effects),
        Command::PART(channel, reason) => handle_part(message, channel, reason, &server, ctx, &mut effects),
        Command::QUIT(reason) => handle_quit(message, reason, &server, &mut effects),
        Command::TOPIC(channel, topic) => {
            effects.push(Effect::ChannelStoreTopic { channel: channel.clone(), topic: topic.clone() });
            effects.push(Effect::Emit(ViewerEvent::Topic(TopicEvent {
                server: server.clone(),
                channel: channel.clone(),
                topic: topic.clone(),
            })));
        }
        Command::PING(token, _) => effects.push(Effect::Reply(Command::PONG(token.clone(), None))),
        Command::Raw(cmd, args, suffix) if cmd.eq_ignore_ascii_case("MODE") => {
            handle_mode(args, suffix.as_deref(), &server, ctx, &mut effects)
        }
        Command::Response(response, args, suffix) => {
            handle_response(*response, args, suffix.as_deref(), &server, ctx, &mut effects)
        }
        _ => {}
    }

    effects
}

fn handle_privmsg(message: &Message, target: &str, content: &str, ctx: &HandlerContext, effects: &mut Vec<Effect>) {
    let from = message.source_nickname().unwrap_or_default().to_owned();
    let server = ctx.network.to_owned();

    if Ctcp::is_ctcp(content) {
        let Ok(request) = Ctcp::decode(content) else { return };

        if request.command == "ACTION" {
            emit_message_or_pm(target, &from, &request.params, MessageKind::Action, ctx, effects);
            return;
        }

        if let Some(reply) = ctcp::respond(&request, ctx.self_nick, ctx.realname, ctx.ctcp_version, ctx.ctcp_source) {
            effects.push(Effect::Reply(Command::NOTICE(from, reply.encode())));
        }
        let _ = server;
        return;
    }

    emit_message_or_pm(target, &from, content, MessageKind::Privmsg, ctx, effects);
}

fn emit_message_or_pm(
    target: &str,
    from: &str,
    content: &str,
    kind: MessageKind,
    ctx: &HandlerContext,
    effects: &mut Vec<Effect>,
) {
    let server = ctx.network.to_owned();
    if target.eq_ignore_ascii_case(ctx.self_nick) {
        effects.push(Effect::Emit(ViewerEvent::Pm(PmEvent {
            server: server.clone(),
            from: from.to_owned(),
            to: String::new(),
            content: content.to_owned(),
        })));
        effects.push(Effect::AppendMessage { to: from.to_owned(), from: from.to_owned(), content: content.to_owned(), kind });
    } else {
        effects.push(Effect::Emit(ViewerEvent::Message(MessageEvent {
            server,
            from: from.to_owned(),
            to: target.to_owned(),
            content: content.to_owned(),
        })));
        effects.push(Effect::AppendMessage { to: target.to_owned(), from: from.to_owned(), content: content.to_owned(), kind });
    }
}

fn handle_notice(message: &Message, target: &str, content: &str, server: &str, effects: &mut Vec<Effect>) {
    let from = message.source_nickname().unwrap_or(server).to_owned();
    effects.push(Effect::AppendMessage { to: target.to_owned(), from, content: content.to_owned(), kind: MessageKind::Notice });
}

fn handle_nick(message: &Message, new_nick: &str, server: &str, ctx: &HandlerContext, effects: &mut Vec<Effect>) {
    let Some(old_nick) = message.source_nickname() else { return };

    effects.push(Effect::ChannelStoreRename { old: old_nick.to_owned(), new: new_nick.to_owned() });
    effects.push(Effect::Emit(ViewerEvent::Nick(NickEvent {
        server: server.to_owned(),
        old: old_nick.to_owned(),
        new: new_nick.to_owned(),
    })));
    let _ = ctx.self_nick;
}

fn handle_join(message: &Message, channel: &str, server: &str, ctx: &HandlerContext, effects: &mut Vec<Effect>) {
    let Some(user) = message.source_nickname() else { return };

    effects.push(Effect::ChannelStoreJoin { channel: channel.to_owned(), user: user.to_owned() });
    effects.push(Effect::Emit(ViewerEvent::Join(JoinEvent {
        server: server.to_owned(),
        channel: channel.to_owned(),
        user: user.to_owned(),
    })));

    if user.eq_ignore_ascii_case(ctx.self_nick) {
        effects.push(Effect::StoreJoinChannel { channel: channel.to_owned() });
    }
}

fn handle_part(
    message: &Message,
    channel: &str,
    reason: &Option<String>,
    server: &str,
    ctx: &HandlerContext,
    effects: &mut Vec<Effect>,
) {
    let Some(user) = message.source_nickname() else { return };

    effects.push(Effect::ChannelStorePart { channel: channel.to_owned(), user: user.to_owned() });
    effects.push(Effect::Emit(ViewerEvent::Part(PartEvent {
        server: server.to_owned(),
        channel: channel.to_owned(),
        user: user.to_owned(),
        reason: reason.clone(),
    })));

    if user.eq_ignore_ascii_case(ctx.self_nick) {
        effects.push(Effect::StorePartChannel { channel: channel.to_owned() });
    }
}

fn handle_quit(message: &Message, reason: &Option<String>, server: &str, effects: &mut Vec<Effect>) {
    let Some(user) = message.source_nickname() else { return };

    effects.push(Effect::ChannelStoreQuit { user: user.to_owned() });
    effects.push(Effect::Emit(ViewerEvent::Quit(QuitEvent {
        server: server.to_owned(),
        user: user.to_owned(),
        reason: reason.clone(),
    })));
}

fn handle_mode(args: &[String], suffix: Option<&str>, server: &str, ctx: &HandlerContext, effects: &mut Vec<Effect>) {
    let Some(target) = args.first() else { return };
    let Some(mode_str) = args.get(1) else { return };
    let mode_args: Vec<&str> = args.iter().skip(2).map(String::as_str).chain(suffix).collect();

    let is_channel = ctx.features.chantypes().chars().any(|c| target.starts_with(c));
    if !is_channel {
        // A self-targeted user MODE (e.g. `+i`); no channel-facing event.
        let _ = Mode::parse_user(mode_str);
        return;
    }

    let prefix_modes = ctx.features.prefix().modes;
    let Ok(modes) = Mode::parse_channel(mode_str, &mode_args, &prefix_modes) else { return };

    let mut add = String::new();
    let mut remove = String::new();
    let mut target_user = String::new();

    for mode in modes {
        match mode {
            Mode::Plus(m, arg) => {
                add.push_str(&m.to_string());
                if let Some(arg) = arg {
                    target_user = arg;
                }
            }
            Mode::Minus(m, arg) => {
                remove.push_str(&m.to_string());
                if let Some(arg) = arg {
                    target_user = arg;
                }
            }
        }
    }

    effects.push(Effect::Emit(ViewerEvent::Mode(ModeEvent {
        server: server.to_owned(),
        channel: target.clone(),
        user: target_user,
        add,
        remove,
    })));
}

fn handle_response(
    response: Response,
    args: &[String],
    suffix: Option<&str>,
    server: &str,
    ctx: &HandlerContext,
    effects: &mut Vec<Effect>,
) {
    match response {
        Response::RPL_WELCOME => {
            effects.push(Effect::Emit(ViewerEvent::Nick(NickEvent {
                server: server.to_owned(),
                old: ctx.self_nick.to_owned(),
                new: ctx.self_nick.to_owned(),
            })));
            let greeting = args.iter().skip(1).cloned().chain(suffix.map(str::to_owned)).collect::<Vec<_>>().join(" ");
            effects.push(Effect::Emit(ViewerEvent::Pm(PmEvent {
                server: server.to_owned(),
                from: server.to_owned(),
                to: String::new(),
                content: greeting,
            })));
        }
        Response::RPL_NOTOPIC => {
            if let Some(channel) = args.get(1) {
                effects.push(Effect::ChannelStoreTopic { channel: channel.clone(), topic: None });
                effects.push(Effect::Emit(ViewerEvent::Topic(TopicEvent {
                    server: server.to_owned(),
                    channel: channel.clone(),
                    topic: None,
                })));
            }
        }
        Response::RPL_TOPIC => {
            if let (Some(channel), Some(topic)) = (args.get(1), suffix) {
                effects.push(Effect::ChannelStoreTopic { channel: channel.clone(), topic: Some(topic.to_owned()) });
                effects.push(Effect::Emit(ViewerEvent::Topic(TopicEvent {
                    server: server.to_owned(),
                    channel: channel.clone(),
                    topic: Some(topic.to_owned()),
                })));
            }
        }
        Response::ERR_ERRONEOUSNICKNAME | Response::ERR_NICKNAMEINUSE | Response::ERR_NICKCOLLISION => {
            let nick = args.get(1).cloned().unwrap_or_default();
            let reason = suffix.unwrap_or("nickname rejected by server").to_owned();
            effects.push(Effect::Emit(ViewerEvent::Pm(PmEvent {
                server: server.to_owned(),
                from: server.to_owned(),
                to: ctx.self_nick.to_owned(),
                content: reason.clone(),
            })));
            effects.push(Effect::Emit(ViewerEvent::NickFail(NickFailEvent {
                server: server.to_owned(),
                nick,
                reason,
            })));
        }
        other if other.is_error() => {
            effects.push(Effect::Emit(ViewerEvent::Error(ErrorEvent {
                server: server.to_owned(),
                code: Some(other as u16),
                message: suffix.unwrap_or_default().to_owned(),
            })));
        }
        _ => {}
    }
}

/// Builds a `users` event from a finished NAMES assembly, for the Client
/// driving loop to emit once its own buffer flushes.
pub fn users_event(server: &str, channel: &str, users: Vec<String>) -> ViewerEvent {
    ViewerEvent::Users(UsersEvent { server: server.to_owned(), channel: channel.to_owned(), users })
}

/// Builds a `whois` event from a finished WHOIS assembly.
pub fn whois_event(server: &str, acc: &crate::client::replies::WhoisAccumulator) -> ViewerEvent {
    ViewerEvent::Whois(WhoisEvent {
        server: server.to_owned(),
        nick: acc.nick.clone(),
        username: acc.username.clone(),
        host: acc.host.clone(),
        realname: acc.realname.clone(),
        server_name: acc.server_name.clone(),
        channels: acc.channels.clone(),
    })
}

/// Builds a `motd` event from a finished MOTD assembly.
pub fn motd_event(server: &str, title: Option<String>, lines: Vec<String>) -> ViewerEvent {
    ViewerEvent::Motd(MotdEvent { server: server.to_owned(), title, lines })
}

/// Builds a `channels` event from a finished LIST assembly.
pub fn channels_event(server: &str, rows: Vec<crate::client::replies::ListingRow>) -> ViewerEvent {
    ViewerEvent::Channels(ChannelsEvent {
        server: server.to_owned(),
        channels: rows
            .into_iter()
            .map(|row| ChannelListing { name: row.name, user_count: row.user_count, topic: row.topic })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_proto::Prefix;

    fn ctx<'a>(features: &'a FeatureMap) -> HandlerContext<'a> {
        HandlerContext {
            network: "host.com",
            self_nick: "nick",
            features,
            ctcp_version: "Dispatch test",
            ctcp_source: "https://example.test/dispatch",
            realname: "Test User",
        }
    }

    fn from(nick: &str, command: Command) -> Message {
        Message::with_prefix(Prefix::new_from_str(&format!("{}!user@host", nick)), command)
    }

    #[test]
    fn nick_event_scenario() {
        let features = FeatureMap::new();
        let msg = from("old", Command::NICK("new".into()));
        let effects = handle(&msg, &ctx(&features));
        assert!(matches!(
            effects.last(),
            Some(Effect::Emit(ViewerEvent::Nick(e))) if e.server == "host.com" && e.old == "old" && e.new == "new"
        ));
    }

    #[test]
    fn part_with_reason_scenario() {
        let features = FeatureMap::new();
        let msg = from("parting", Command::PART("#chan".into(), Some("the reason".into())));
        let effects = handle(&msg, &ctx(&features));
        assert!(matches!(
            effects.last(),
            Some(Effect::Emit(ViewerEvent::Part(e)))
                if e.server == "host.com" && e.user == "parting" && e.channel == "#chan" && e.reason.as_deref() == Some("the reason")
        ));
    }

    #[test]
    fn mode_scenario_splits_add_and_remove() {
        let mut features = FeatureMap::new();
        features.ingest(&["PREFIX=(ov)@+", "CHANTYPES=#&"]);
        let msg = Message::new(Command::Raw(
            "MODE".into(),
            vec!["#chan".into(), "+o-v".into(), "nick".into()],
            None,
        ));
        let effects = handle(&msg, &ctx(&features));
        assert!(matches!(
            effects.last(),
            Some(Effect::Emit(ViewerEvent::Mode(e)))
                if e.server == "host.com" && e.channel == "#chan" && e.add == "o" && e.remove == "v"
        ));
    }

    #[test]
    fn self_pm_vs_channel_message() {
        let features = FeatureMap::new();
        let pm = from("someone", Command::PRIVMSG("nick".into(), "the message".into()));
        let effects = handle(&pm, &ctx(&features));
        assert!(matches!(
            effects.first(),
            Some(Effect::Emit(ViewerEvent::Pm(e))) if e.from == "someone" && e.to.is_empty() && e.content == "the message"
        ));

        let channel_msg = from("nick", Command::PRIVMSG("#chan".into(), "the message".into()));
        let effects = handle(&channel_msg, &ctx(&features));
        assert!(matches!(
            effects.first(),
            Some(Effect::Emit(ViewerEvent::Message(e))) if e.from == "nick" && e.to == "#chan"
        ));
    }

    #[test]
    fn bad_nick_produces_error_pm_then_nick_fail() {
        let features = FeatureMap::new();
        let msg = Message::new(Command::Response(
            Response::ERR_ERRONEOUSNICKNAME,
            vec!["*".into(), "bad nick".into()],
            Some("Erroneous nickname".into()),
        ));
        let effects = handle(&msg, &ctx(&features));
        assert_eq!(effects.len(), 2);
        assert!(matches!(&effects[0], Effect::Emit(ViewerEvent::Pm(e)) if e.to == "nick"));
        assert!(matches!(&effects[1], Effect::Emit(ViewerEvent::NickFail(e)) if e.nick == "bad nick"));
    }
}
