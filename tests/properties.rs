use proptest::prelude::*;
use sqlroute::prelude::*;

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,9}"
}

/// Tables with declared columns, duplicates allowed.
fn tables() -> impl Strategy<Value = Vec<(String, Vec<String>)>> {
    prop::collection::vec((ident(), prop::collection::vec(ident(), 0..6)), 0..5)
}

fn render(tables: &[(String, Vec<String>)]) -> String {
    let mut text = String::from("# generated\n\n");
    for (table, columns) in tables {
        text.push_str(&format!("### {}\n", table));
        for column in columns {
            text.push_str(&format!("  - {}: some description\n", column));
        }
        text.push('\n');
    }
    text
}

/// What the flat list must be: later headings for the same table replace its
/// columns but keep its first slot.
fn expected_flat(tables: &[(String, Vec<String>)]) -> Vec<String> {
    let mut merged: Vec<(String, Vec<String>)> = Vec::new();
    for (table, columns) in tables {
        match merged.iter_mut().find(|(t, _)| t == table) {
            Some((_, cols)) => *cols = columns.clone(),
            None => merged.push((table.clone(), columns.clone())),
        }
    }
    merged
        .iter()
        .flat_map(|(t, cols)| cols.iter().map(move |c| format!("{}.{}", t, c)))
        .collect()
}

fn question() -> impl Strategy<Value = String> {
    prop::collection::vec("[A-Za-z0-9_ ,.?-]{0,12}", 0..8).prop_map(|words| words.join(" "))
}

fn route() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("sql_query".to_string()),
        Just("clarify".to_string()),
        "[a-z_]{0,10}",
    ]
}

proptest! {
    #[test]
    fn schema_round_trip(tables in tables()) {
        let index = SchemaIndex::parse(&render(&tables));
        let flat: Vec<String> = index.flat_columns().iter().map(ToString::to_string).collect();
        prop_assert_eq!(flat, expected_flat(&tables));
    }

    #[test]
    fn hints_are_capped_unique_and_deterministic(tables in tables(), text in question(), k in 0usize..6) {
        let index = SchemaIndex::parse(&render(&tables));
        let first = sqlroute::suggest(&text, &index, k);
        let second = sqlroute::suggest(&text, &index, k);

        prop_assert!(first.len() <= k);
        prop_assert_eq!(&first, &second);

        let mut cols: Vec<&str> = first.columns().map(ColumnRef::as_str).collect();
        prop_assert!(cols.iter().all(|c| index.contains(c)));
        cols.sort_unstable();
        cols.dedup();
        prop_assert_eq!(cols.len(), first.len());
        prop_assert!(first.iter().all(|h| h.score >= 65.0 && h.score <= 100.0));
    }

    #[test]
    fn reconciled_suggestions_are_schema_true(
        tables in tables(),
        text in question(),
        route in route(),
        raw_suggestions in prop::collection::vec("[a-z_]{1,8}\\.[a-z_]{1,8}", 0..6),
    ) {
        let index = SchemaIndex::parse(&render(&tables));
        let hints = sqlroute::suggest(&text, &index, 3);
        let raw = RawDecision::new(route.clone(), raw_suggestions);
        let decision = sqlroute::reconcile(&raw, &hints, &index);

        prop_assert!(decision.validate(&index, 3).is_ok());
        if decision.route == Route::Clarify {
            prop_assert!(decision.suggestions.is_empty());
        }
        if route == "clarify" {
            prop_assert_eq!(decision.route, Route::Clarify);
        }
    }

    #[test]
    fn backfill_fills_up_to_cap(tables in tables(), text in question()) {
        let index = SchemaIndex::parse(&render(&tables));
        let hints = sqlroute::suggest(&text, &index, 3);
        let raw = RawDecision::new("sql_query", ["not-a.column"]);
        let decision = sqlroute::reconcile(&raw, &hints, &index);

        let hinted: Vec<ColumnRef> = hints.into_columns();
        prop_assert_eq!(decision.suggestions, hinted);
    }
}
