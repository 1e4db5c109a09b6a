//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Chat protocol end-to-end tests

use linewire_client::LineClient;
use linewire_protocols::{ChatFactory, NAME_PROMPT, NAME_TAKEN};
use linewire_service::{LineServer, Registry};
use linewire_testsuite::{connect, serve, wait_until, within};
use std::sync::Arc;

async fn chat_server() -> (LineServer, Registry) {
    let registry = Registry::new();
    let server = serve(Arc::new(ChatFactory::new(registry.clone()))).await;
    (server, registry)
}

async fn login(server: &LineServer, name: &str) -> LineClient {
    let mut client = connect(server).await;
    client.expect_line(NAME_PROMPT).await.unwrap();
    client.send_line(name).await.unwrap();
    client.expect_line(&format!("Welcome, {name}!")).await.unwrap();
    client
}

#[tokio::test]
async fn test_message_reaches_everyone_but_sender() {
    let (server, _registry) = chat_server().await;
    let mut alice = login(&server, "alice").await;
    let mut bob = login(&server, "bob").await;
    let mut carol = login(&server, "carol").await;

    alice.send_line("hello everyone").await.unwrap();
    bob.expect_line("<alice> hello everyone").await.unwrap();
    carol.expect_line("<alice> hello everyone").await.unwrap();

    // alice's next line must be bob's message, not her own
    bob.send_line("hi alice").await.unwrap();
    alice.expect_line("<bob> hi alice").await.unwrap();
    carol.expect_line("<bob> hi alice").await.unwrap();

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_carriage_return_inside_message_is_relayed() {
    let (server, _registry) = chat_server().await;
    let mut alice = login(&server, "alice").await;
    let mut bob = login(&server, "bob").await;

    alice.send_line("hello\rworld").await.unwrap();
    bob.expect_line("<alice> hello\rworld").await.unwrap();

    bob.send_line("still connected").await.unwrap();
    alice.expect_line("<bob> still connected").await.unwrap();

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unauthenticated_users_receive_nothing() {
    let (server, _registry) = chat_server().await;
    let mut alice = login(&server, "alice").await;
    let mut bob = login(&server, "bob").await;
    let mut lurker = connect(&server).await;
    lurker.expect_line(NAME_PROMPT).await.unwrap();

    alice.send_line("anyone here?").await.unwrap();
    bob.expect_line("<alice> anyone here?").await.unwrap();

    lurker.send_line("dave").await.unwrap();
    // the welcome is the first line after the prompt
    lurker.expect_line("Welcome, dave!").await.unwrap();

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_name_taken_then_retry() {
    let (server, _registry) = chat_server().await;
    let _alice = login(&server, "alice").await;

    let mut second = connect(&server).await;
    second.expect_line(NAME_PROMPT).await.unwrap();
    second.send_line("alice").await.unwrap();
    second.expect_line(NAME_TAKEN).await.unwrap();
    second.send_line("alicia").await.unwrap();
    second.expect_line("Welcome, alicia!").await.unwrap();

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_empty_name_is_prompted_again() {
    let (server, registry) = chat_server().await;
    let mut client = connect(&server).await;
    client.expect_line(NAME_PROMPT).await.unwrap();
    client.send_line("").await.unwrap();
    client.expect_line(NAME_PROMPT).await.unwrap();
    assert!(registry.is_empty());

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_releases_name() {
    let (server, registry) = chat_server().await;
    let mut alice = login(&server, "alice").await;
    let bob = login(&server, "bob").await;
    assert_eq!(registry.len(), 2);

    bob.close().await.unwrap();
    wait_until(|| !registry.contains("bob")).await;

    // nothing is relayed to the departed user, and the name is free again
    alice.send_line("bob?").await.unwrap();
    let mut new_bob = login(&server, "bob").await;
    new_bob.send_line("back").await.unwrap();
    alice.expect_line("<bob> back").await.unwrap();

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_logins_with_same_name() {
    let (server, registry) = chat_server().await;

    let mut clients = Vec::new();
    for _ in 0..8 {
        let mut client = connect(&server).await;
        client.expect_line(NAME_PROMPT).await.unwrap();
        clients.push(client);
    }

    let attempts = clients.into_iter().map(|mut client| {
        tokio::spawn(async move {
            client.send_line("highlander").await.unwrap();
            let reply = client.recv_line().await.unwrap();
            (reply, client)
        })
    });

    let mut welcomed = 0;
    let mut rejected = 0;
    let mut keep = Vec::new();
    for attempt in attempts.collect::<Vec<_>>() {
        let (reply, client) = within(attempt).await.unwrap();
        match reply.as_str() {
            "Welcome, highlander!" => welcomed += 1,
            NAME_TAKEN => rejected += 1,
            other => panic!("unexpected reply {other:?}"),
        }
        keep.push(client);
    }

    assert_eq!(welcomed, 1);
    assert_eq!(rejected, 7);
    assert_eq!(registry.names(), vec!["highlander".to_string()]);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_clears_registry() {
    let (server, registry) = chat_server().await;
    let mut alice = login(&server, "alice").await;
    let mut bob = login(&server, "bob").await;

    let reader = tokio::spawn(async move {
        let a = alice.read_to_close().await;
        let b = bob.read_to_close().await;
        (a, b)
    });

    server.shutdown().await.unwrap();
    let (a, b) = within(reader).await.unwrap();
    assert!(a.unwrap().is_empty());
    assert!(b.unwrap().is_empty());
    assert!(registry.is_empty());
}
