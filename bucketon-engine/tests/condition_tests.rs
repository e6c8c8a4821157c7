use bucketon_engine::{Combinator, ConditionSpec, DerivedKey, Entity, Error, KeyError, compile_condition};
use pretty_assertions::assert_eq;
use serde_json::json;

fn make_task(data: serde_json::Value) -> Entity {
    Entity {
        id: "task-1".to_string(),
        entity_type: "task".to_string(),
        data,
        created_at: 1_711_929_600_000,
        modified_at: 1_711_929_600_000,
        created_by: "peer-1".to_string(),
    }
}

fn derive(spec: Option<&ConditionSpec>, entity: &Entity) -> Result<DerivedKey, KeyError> {
    compile_condition(spec).unwrap()(entity)
}

// ── Absent condition ─────────────────────────────────────────────

#[test]
fn no_condition_always_yields_nil() {
    let key = derive(None, &make_task(json!({"status": "open"}))).unwrap();
    assert_eq!(key.key, "nil");
}

// ── FieldRef ─────────────────────────────────────────────────────

#[test]
fn field_ref_stringifies_values() {
    let spec = ConditionSpec::field("status");
    assert_eq!(derive(Some(&spec), &make_task(json!({"status": "open"}))).unwrap().key, "open");

    let spec = ConditionSpec::field("priority");
    assert_eq!(derive(Some(&spec), &make_task(json!({"priority": 2}))).unwrap().key, "2");

    let spec = ConditionSpec::field("done");
    assert_eq!(derive(Some(&spec), &make_task(json!({"done": true}))).unwrap().key, "true");

    let spec = ConditionSpec::field("tags");
    assert_eq!(
        derive(Some(&spec), &make_task(json!({"tags": ["a", "b"]}))).unwrap().key,
        r#"["a","b"]"#
    );
}

#[test]
fn field_ref_null_is_empty() {
    let spec = ConditionSpec::field("status");
    assert_eq!(derive(Some(&spec), &make_task(json!({"status": null}))).unwrap().key, "");
}

#[test]
fn field_ref_false_is_empty() {
    let spec = ConditionSpec::field("done");
    assert_eq!(derive(Some(&spec), &make_task(json!({"done": false}))).unwrap().key, "");
}

#[test]
fn field_ref_missing_field_errors() {
    let spec = ConditionSpec::field("status");
    assert_eq!(
        derive(Some(&spec), &make_task(json!({}))),
        Err(KeyError::MissingField("status".to_string()))
    );
}

#[test]
fn field_ref_reads_builtin_attributes() {
    let spec = ConditionSpec::field("created_by");
    assert_eq!(derive(Some(&spec), &make_task(json!({}))).unwrap().key, "peer-1");
}

#[test]
fn blank_field_name_is_rejected_at_compile_time() {
    let err = compile_condition(Some(&ConditionSpec::field("  "))).err().unwrap();
    assert!(matches!(err, Error::InvalidConditions(_)));
}

// ── Formatted ────────────────────────────────────────────────────

#[test]
fn formatted_rfc3339_string() {
    let spec = ConditionSpec::formatted("due_at", "%y%m%d");
    let task = make_task(json!({"due_at": "2024-03-15T10:30:00Z"}));
    assert_eq!(derive(Some(&spec), &task).unwrap().key, "240315");
}

#[test]
fn formatted_keeps_the_timestamps_own_offset() {
    let spec = ConditionSpec::formatted("due_at", "%Y-%m-%d");
    let task = make_task(json!({"due_at": "2024-03-15T23:30:00-05:00"}));
    assert_eq!(derive(Some(&spec), &task).unwrap().key, "2024-03-15");
}

#[test]
fn formatted_plain_date() {
    let spec = ConditionSpec::formatted("due_at", "%Y/%m");
    let task = make_task(json!({"due_at": "2024-03-15"}));
    assert_eq!(derive(Some(&spec), &task).unwrap().key, "2024/03");
}

#[test]
fn formatted_epoch_millis() {
    // 2024-04-01T00:00:00Z
    let spec = ConditionSpec::formatted("created_at", "%Y-%m");
    assert_eq!(derive(Some(&spec), &make_task(json!({}))).unwrap().key, "2024-04");
}

#[test]
fn formatted_unparseable_value_errors() {
    let spec = ConditionSpec::formatted("due_at", "%y%m%d");
    let err = derive(Some(&spec), &make_task(json!({"due_at": "next tuesday"}))).unwrap_err();
    assert!(matches!(err, KeyError::InvalidTimestamp { .. }));

    let err = derive(Some(&spec), &make_task(json!({"due_at": true}))).unwrap_err();
    assert!(matches!(err, KeyError::TypeMismatch { .. }));
}

#[test]
fn formatted_null_is_empty() {
    let spec = ConditionSpec::formatted("due_at", "%y%m%d");
    assert_eq!(derive(Some(&spec), &make_task(json!({"due_at": null}))).unwrap().key, "");
}

#[test]
fn invalid_time_format_is_rejected_at_compile_time() {
    let err = compile_condition(Some(&ConditionSpec::formatted("due_at", "%Q"))).err().unwrap();
    assert!(matches!(err, Error::InvalidConditions(_)));
}

// ── Composite ────────────────────────────────────────────────────

#[test]
fn concat_joins_parts_without_separator() {
    let spec = ConditionSpec::concat([ConditionSpec::field("year"), ConditionSpec::field("month")]);
    let task = make_task(json!({"year": "24", "month": "03"}));
    assert_eq!(derive(Some(&spec), &task).unwrap().key, "2403");
}

#[test]
fn concat_fails_when_any_part_fails() {
    let spec = ConditionSpec::concat([ConditionSpec::field("year"), ConditionSpec::field("month")]);
    assert!(derive(Some(&spec), &make_task(json!({"year": "24"}))).is_err());
}

#[test]
fn and_yields_last_part_when_all_hold() {
    let spec = ConditionSpec::all([ConditionSpec::field("active"), ConditionSpec::field("status")]);
    let task = make_task(json!({"active": true, "status": "open"}));
    assert_eq!(derive(Some(&spec), &task).unwrap().key, "open");
}

#[test]
fn and_short_circuits_on_falsy_part() {
    let spec = ConditionSpec::all([ConditionSpec::field("active"), ConditionSpec::field("status")]);

    // "status" is never read once "active" is false
    let task = make_task(json!({"active": false}));
    assert_eq!(derive(Some(&spec), &task).unwrap().key, "");

    let task = make_task(json!({"active": "", "status": "open"}));
    assert_eq!(derive(Some(&spec), &task).unwrap().key, "");
}

#[test]
fn and_keeps_the_string_false() {
    let spec = ConditionSpec::all([ConditionSpec::field("answer")]);
    let task = make_task(json!({"answer": "false"}));
    assert_eq!(derive(Some(&spec), &task).unwrap().key, "false");
}

#[test]
fn single_field_and_one_part_and_agree() {
    let alone = ConditionSpec::field("done");
    let wrapped = ConditionSpec::all([ConditionSpec::field("done")]);
    for data in [
        json!({"done": false}),
        json!({"done": true}),
        json!({"done": null}),
        json!({"done": "false"}),
    ] {
        let task = make_task(data);
        assert_eq!(derive(Some(&alone), &task), derive(Some(&wrapped), &task));
    }
}

#[test]
fn empty_composite_is_rejected() {
    let err = compile_condition(Some(&ConditionSpec::concat([]))).err().unwrap();
    assert!(matches!(err, Error::InvalidConditions(_)));
}

// ── Literal ──────────────────────────────────────────────────────

#[test]
fn literal_can_return_labeled_keys() {
    let spec = ConditionSpec::literal(|record| {
        let priority = record.field("priority")?;
        match priority.as_i64() {
            Some(p) if p >= 3 => Ok(DerivedKey::labeled("high", "High priority")),
            Some(_) => Ok(DerivedKey::labeled("low", "Low priority")),
            None => Err(KeyError::Custom("priority is not a number".into())),
        }
    });
    let key = derive(Some(&spec), &make_task(json!({"priority": 5}))).unwrap();
    assert_eq!(key, DerivedKey::labeled("high", "High priority"));

    let err = derive(Some(&spec), &make_task(json!({"priority": "urgent"}))).unwrap_err();
    assert_eq!(err, KeyError::Custom("priority is not a number".into()));
}

// ── Declarative shapes ───────────────────────────────────────────

#[test]
fn from_value_null_is_no_condition() {
    assert!(ConditionSpec::from_value(&json!(null)).unwrap().is_none());
}

#[test]
fn from_value_string_is_field_ref() {
    let spec = ConditionSpec::from_value(&json!("status")).unwrap().unwrap();
    assert!(matches!(spec, ConditionSpec::FieldRef(ref name) if name == "status"));
}

#[test]
fn from_value_array_is_and_composite() {
    let spec = ConditionSpec::from_value(&json!(["active", "status"])).unwrap().unwrap();
    assert!(matches!(
        spec,
        ConditionSpec::Composite { combinator: Combinator::And, ref parts } if parts.len() == 2
    ));
}

#[test]
fn from_value_explicit_combinators() {
    let spec = ConditionSpec::from_value(&json!({"concat": ["year", "month"]})).unwrap().unwrap();
    assert!(matches!(spec, ConditionSpec::Composite { combinator: Combinator::Concat, .. }));

    let spec = ConditionSpec::from_value(&json!({"all": ["a", {"concat": ["b", "c"]}]})).unwrap().unwrap();
    assert!(matches!(spec, ConditionSpec::Composite { combinator: Combinator::And, .. }));
}

#[test]
fn from_value_formatted_field() {
    let spec = ConditionSpec::from_value(&json!({"field": "due_at", "format": "%y%m%d"}))
        .unwrap()
        .unwrap();
    let task = make_task(json!({"due_at": "2024-03-15T10:30:00Z"}));
    assert_eq!(derive(Some(&spec), &task).unwrap().key, "240315");
}

#[test]
fn from_value_rejects_unrecognized_shapes() {
    for bad in [
        json!(1234),
        json!(true),
        json!({"unknown": "x"}),
        json!({"field": "a", "extra": 1}),
        json!({"concat": "year"}),
        json!(["status", null]),
        json!(["status", 7]),
    ] {
        let err = ConditionSpec::from_value(&bad).unwrap_err();
        assert!(matches!(err, Error::InvalidConditions(_)), "accepted {bad}");
    }
}

#[test]
fn debug_hides_literal_function() {
    let spec = ConditionSpec::literal(|_| Ok(DerivedKey::bare("x")));
    assert_eq!(format!("{spec:?}"), "Literal(<fn>)");
}
