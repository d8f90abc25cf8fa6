use comfy_table::{presets::UTF8_BORDERS_ONLY, Cell, Color, Table};

use hashaudit_core::{Algorithm, HybridMode, MaskToken, Rule};

/// Prints the supported algorithms, attack modes, mask placeholders and rules.
pub fn info() {
    let mut algorithms = Table::new();
    algorithms.load_preset(UTF8_BORDERS_ONLY);
    algorithms.set_header(vec!["Algorithm", "Verification"]);

    for algorithm in Algorithm::all() {
        let verification = if algorithm.is_verify_only() {
            Cell::new("verify-only").fg(Color::Yellow)
        } else {
            Cell::new("digest").fg(Color::Green)
        };

        algorithms.add_row(vec![Cell::new(algorithm), verification]);
    }

    println!("{algorithms}");

    let mut attacks = Table::new();
    attacks.load_preset(UTF8_BORDERS_ONLY);
    attacks.set_header(vec!["Attack", "Modes"]);
    attacks.add_row(vec!["dictionary", "-"]);
    attacks.add_row(vec!["mask", "-"]);
    attacks.add_row(vec![
        "hybrid".to_owned(),
        HybridMode::ALL.map(|mode| mode.to_string()).join(", "),
    ]);

    println!("{attacks}");

    let mut placeholders = Table::new();
    placeholders.load_preset(UTF8_BORDERS_ONLY);
    placeholders.set_header(vec!["Placeholder", "Size", "Charset"]);

    for token in MaskToken::ALL {
        placeholders.add_row(vec![
            Cell::new(token.placeholder()),
            Cell::new(token.radix()),
            Cell::new(String::from_utf8_lossy(token.charset())),
        ]);
    }

    println!("{placeholders}");

    let mut rules = Table::new();
    rules.load_preset(UTF8_BORDERS_ONLY);
    rules.set_header(vec!["Rule", "Enabled by default"]);

    for rule in Rule::DEFAULT {
        rules.add_row(vec![Cell::new(rule), Cell::new("yes").fg(Color::Green)]);
    }
    for rule in Rule::EXTENDED {
        rules.add_row(vec![Cell::new(rule), Cell::new("no").fg(Color::Grey)]);
    }

    println!("{rules}");
}
