//! CLI parse tests.

use super::{Cli, CliCommand, PollArgs};
use clap::Parser;

pub(super) fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

pub(super) fn parse_poll(args: &[&str]) -> PollArgs {
    match parse(args) {
        CliCommand::Poll(poll) => poll,
        other => panic!("expected Poll, got {:?}", other),
    }
}

mod config;
