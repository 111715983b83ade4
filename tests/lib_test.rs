//! Library integration tests.

use conveyor::ConveyorError;

#[test]
fn error_types_are_public() {
    let err = ConveyorError::UnknownWorkflow {
        name: "nightly".into(),
    };
    assert!(err.to_string().contains("nightly"));
}

#[test]
fn result_type_alias_is_public() {
    fn test_fn() -> conveyor::Result<()> {
        Ok(())
    }
    assert!(test_fn().is_ok());
}

#[test]
fn cli_types_are_public() {
    use clap::Parser;
    use conveyor::cli::{Cli, Commands};

    let cli = Cli::parse_from(["conveyor", "history", "--json", "--limit", "3"]);

    if let Some(Commands::History(args)) = cli.command {
        assert!(args.json);
        assert_eq!(args.limit, Some(3));
    } else {
        panic!("Expected History command");
    }
}

#[test]
fn state_types_are_public() {
    use conveyor::runner::TriggerEvent;
    use conveyor::state::{HistoryStore, RunHistoryBuilder};

    let mut store = HistoryStore::default();
    let builder = RunHistoryBuilder::start(None, &TriggerEvent::push("main"));
    store.record(builder.finish(), 5);
    assert_eq!(store.len(), 1);
}
