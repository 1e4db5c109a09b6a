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

//! Interactive line client
//!
//! ```text
//! cargo run -p linewire-client --example line_client -- localhost 8123
//! ```
//!
//! Lines typed on stdin are sent to the server; lines from the server are
//! printed as they arrive.

use linewire_client::{ClientConfig, LineClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port = match args.next() {
        Some(port) => port.parse()?,
        None => 8123,
    };

    let config = ClientConfig::new(host, port).with_read_timeout(None);
    let mut client = LineClient::connect(config).await?;
    eprintln!("Connected to {}", client.peer_addr());

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = client.next_line() => match line? {
                Some(line) => println!("{line}"),
                None => {
                    eprintln!("Server closed the connection");
                    break;
                }
            },
            input = stdin.next_line() => match input? {
                Some(input) => client.send_line(&input).await?,
                None => {
                    client.close().await?;
                    break;
                }
            },
        }
    }

    Ok(())
}
