// tests/property_grammar.rs

use proptest::prelude::*;

use daqctl::remote::inspect::locate_cwd;
use daqctl::remote::quote::shell_quote;
use daqctl::types::run_dir_name;

proptest! {
    #[test]
    fn run_dir_name_is_zero_padded_to_four_digits(n in 0u32..10_000) {
        let name = run_dir_name(n);
        prop_assert_eq!(name.len(), 8);
        prop_assert!(name.starts_with("run_"));
        prop_assert_eq!(name[4..].parse::<u32>().unwrap(), n);
    }

    #[test]
    fn run_dir_name_widens_past_9999(n in 10_000u32..) {
        let name = run_dir_name(n);
        prop_assert_eq!(name, format!("run_{n}"));
    }

    #[test]
    fn cwd_is_found_after_any_noise(
        noise in proptest::collection::vec("[ftp][0-9a-z]{0,8}", 0..6),
        dir in "/[a-zA-Z0-9_./-]{1,24}",
    ) {
        let mut lines: Vec<String> = noise;
        lines.push("cdataRouter".to_string());
        lines.push(format!("n{dir}"));
        let found = locate_cwd(lines.iter().map(String::as_str), "dataRouter", || Ok(())).unwrap();
        prop_assert_eq!(found, dir);
    }

    #[test]
    fn quoting_wraps_anything_unsafe(s in "[^']*") {
        let quoted = shell_quote(&s);
        if quoted != s {
            prop_assert_eq!(quoted, format!("'{s}'"));
        }
    }
}
