// Copyright 2025 Home Team.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::Parser;
use colored::Colorize;
use homecli::cli::{CliArgs, Context, TemplateCreated};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::Level;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let ctx = Context::new(args.site.clone(), args.debug, cancel);
    match args.command.execute(&ctx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.downcast_ref::<TemplateCreated>().is_some() => {
            eprintln!("{}", err);
            ExitCode::from(1)
        }
        Err(err) => {
            eprintln!("{} {:#}", "ERROR:".red(), err);
            ExitCode::from(2)
        }
    }
}
