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

//! End-to-end round trip benchmarks over loopback TCP

use criterion::{Criterion, criterion_group, criterion_main};
use linewire_protocols::{CalcFactory, ChatFactory, NAME_PROMPT};
use linewire_service::Registry;
use linewire_testsuite::{connect, serve};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

fn bench_calc_round_trip(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(serve(Arc::new(CalcFactory)));

    c.bench_function("calc_round_trip", |b| {
        b.to_async(&rt).iter_custom(|iters| {
            let server = &server;
            async move {
                let mut client = connect(server).await;
                let start = Instant::now();
                for i in 0..iters {
                    client.send_line(&format!("add {i} 1")).await.unwrap();
                    black_box(client.recv_line().await.unwrap());
                }
                start.elapsed()
            }
        });
    });

    rt.block_on(server.shutdown()).unwrap();
}

fn bench_chat_fan_out(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(serve(Arc::new(ChatFactory::new(Registry::new()))));

    let mut clients = rt.block_on(async {
        let mut clients = Vec::new();
        for n in 0..10 {
            let mut client = connect(&server).await;
            client.expect_line(NAME_PROMPT).await.unwrap();
            client.send_line(&format!("user{n}")).await.unwrap();
            client.recv_line().await.unwrap();
            clients.push(client);
        }
        clients
    });

    c.bench_function("chat_fan_out_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (sender, listeners) = clients.split_first_mut().unwrap();
                sender.send_line("benchmark message").await.unwrap();
                for listener in listeners {
                    black_box(listener.recv_line().await.unwrap());
                }
            })
        });
    });

    rt.block_on(server.shutdown()).unwrap();
}

criterion_group!(benches, bench_calc_round_trip, bench_chat_fan_out);
criterion_main!(benches);
