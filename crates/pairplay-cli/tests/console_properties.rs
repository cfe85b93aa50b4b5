//! Property-based tests for console parsing.

use pairplay_app::Command;
use pairplay_cli::console::{Input, parse};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_parse_never_panics(line in ".{0,64}") {
        let _ = parse(&line);
    }

    #[test]
    fn prop_place_keeps_coordinates(row in any::<u8>(), col in any::<u8>()) {
        let parsed = parse(&format!("place {row} {col}"));
        prop_assert_eq!(parsed, Ok(Some(Input::Run(Command::PlaceStone { row, col }))));
    }

    #[test]
    fn prop_whitespace_and_slash_are_ignored(
        lead in "[ \t]{0,4}",
        trail in "[ \t]{0,4}",
        slash in any::<bool>(),
    ) {
        let prefix = if slash { "/" } else { "" };
        let parsed = parse(&format!("{lead}{prefix}accept{trail}"));
        prop_assert_eq!(parsed, Ok(Some(Input::Run(Command::Accept))));
    }

    #[test]
    fn prop_out_of_range_coordinates_are_usage_errors(row in 256u32..100_000) {
        let line = format!("place {row} 0");
        prop_assert!(parse(&line).is_err());
    }
}
