// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use clap::Parser;
use sspkit_cli::{cli, logging};

fn main() {
    let cli = cli::Cli::parse();
    cli::handle_command(&cli, logging::init_logging);
}
