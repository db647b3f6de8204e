//! End-to-end exercise of the session fabric's data flow: a scripted mock
//! connection drives a real `Client`, whose events are folded through
//! `Handler` into a `ChannelStore`, a durable `Store`, and a `MemIndexer`,
//! the same way a `State` would.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dispatch::client::conn::Connection;
use dispatch::client::mock::MockStream;
use dispatch::client::{Client, ClientEvent};
use dispatch::config::NetworkConfig;
use dispatch::handler::{self, Effect, HandlerContext};
use dispatch::index::{Indexer, MemIndexer};
use dispatch::store::model::UserId;
use dispatch::{ChannelStore, Store};
use dispatch_proto::FeatureMap;

fn test_network() -> NetworkConfig {
    NetworkConfig {
        host: "irc.example.com".into(),
        port: 6667,
        tls: false,
        password: None,
        nick: "ferris".into(),
        username: "ferris".into(),
        realname: "Ferris the Crab".into(),
        display_name: None,
        autojoin: vec![],
        reconnect: Default::default(),
        ctcp_version: "Dispatch test".into(),
        ctcp_source: "https://example.test/dispatch".into(),
    }
}

#[tokio::test]
async fn scripted_conversation_lands_in_channel_store_and_log() {
    let config = test_network();
    let script = concat!(
        ":irc.example.com 001 ferris :Welcome to the network\r\n",
        ":irc.example.com 005 ferris PREFIX=(ov)@+ CHANTYPES=# :are supported\r\n",
        ":ferris!ferris@host JOIN #rust\r\n",
        ":other!other@host JOIN #rust\r\n",
        ":irc.example.com 353 ferris = #rust :ferris other\r\n",
        ":irc.example.com 366 ferris #rust :End of /NAMES list.\r\n",
        ":other!other@host PRIVMSG #rust :hello there crab\r\n",
        ":other!other@host MODE #rust +o other\r\n",
    )
    .as_bytes()
    .to_vec();

    let mock = Arc::new(Mutex::new(Some(MockStream::new(&script))));
    let (_handle, mut events, _join) = Client::spawn_with_dialer(config, {
        let mock = mock.clone();
        move |_cfg| {
            let stream = mock.lock().unwrap().take().expect("dialed only once in this test");
            Box::pin(async move { Ok(Connection::Mock(stream)) })
        }
    });

    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let index = MemIndexer::new();
    let channel_store = ChannelStore::new();
    let user_id = UserId(1);

    let mut features = FeatureMap::new();
    let mut saw_mode_event = false;

    for _ in 0..12 {
        let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(200), events.recv()).await else {
            break;
        };

        match event {
            ClientEvent::FeaturesUpdated(updated) => features = updated,
            ClientEvent::NamesReady { channel, names } => {
                channel_store.set_users("irc.example.com", &channel, names);
            }
            ClientEvent::Inbound(message) => {
                let ctx = HandlerContext {
                    network: "irc.example.com",
                    self_nick: "ferris",
                    features: &features,
                    ctcp_version: "Dispatch test",
                    ctcp_source: "https://example.test/dispatch",
                    realname: "Ferris the Crab",
                };
                for effect in handler::handle(&message, &ctx) {
                    match effect {
                        Effect::ChannelStoreJoin { channel, user: joiner } => {
                            channel_store.join("irc.example.com", &channel, &joiner)
                        }
                        Effect::AppendMessage { to, from, content, kind } => {
                            let stored = store.append_message(user_id, "irc.example.com", &to, &from, &content, kind).unwrap();
                            index.index(user_id, &stored);
                        }
                        Effect::Emit(dispatch::ViewerEvent::Mode(_)) => saw_mode_event = true,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    let live = channel_store.get("irc.example.com", "#rust").expect("channel known");
    assert!(live.users.contains("ferris"));
    assert!(live.users.contains("other"));
    assert!(saw_mode_event);

    let (page, has_more) = store.messages(user_id, "irc.example.com", "#rust", 10, None).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].content, "hello there crab");
    assert!(!has_more);

    let hits = index.search(user_id, "irc.example.com", "#rust", "crab");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0], page[0].id);
}
