mod common;

use {
    lcbind::{
        command::{
            CommandContext, Counter, CounterOptions, Get, GetOptions, Items, Lock, LockOptions,
            Options, Remove, RemoveOptions, SizedIter, Store, StoreOptions, Unlock, UnlockOptions,
        },
        native::StoreMode,
        result::{KeyItem, OperationResult, ValueResult},
        Config, DefaultTranscoder, Error, Format, Key, StatusCode,
    },
    proptest::prelude::*,
    serde_json::json,
    std::collections::BTreeMap,
};

fn upsert() -> Store {
    Store::new(StoreMode::Upsert, StoreOptions::default(), Format::Json)
}

fn argument_message<T: std::fmt::Debug>(r: Result<T, Error>) -> String {
    match r {
        Err(Error::Argument { message, .. }) => message,
        other => panic!("expected an argument error, got {:?}", other),
    }
}

proptest! {
    #[test]
    fn every_item_gets_one_record(keys in proptest::collection::btree_set("[a-z0-9:]{1,12}", 1..64)) {
        let keys: Vec<String> = keys.into_iter().collect();
        let ctx = CommandContext::new(Get::new(GetOptions::default()), &DefaultTranscoder);
        let batch = ctx.build(keys.clone()).unwrap();
        prop_assert_eq!(batch.len(), keys.len());
        for (cmd, key) in batch.iter().zip(keys.iter()) {
            prop_assert!(!batch.key(cmd).is_empty());
            prop_assert_eq!(batch.key(cmd), key.as_bytes());
        }
    }

    #[test]
    fn mappings_build_one_store_per_entry(n in 1usize..48) {
        let docs: BTreeMap<String, u64> = (0..n).map(|i| (format!("doc:{}", i), i as u64)).collect();
        let ctx = CommandContext::new(upsert(), &DefaultTranscoder);
        let batch = ctx.build(docs.clone()).unwrap();
        prop_assert_eq!(batch.len(), n);
        for (cmd, (key, value)) in batch.iter().zip(docs.iter()) {
            prop_assert_eq!(batch.key(cmd), key.as_bytes());
            let expected = value.to_string();
            prop_assert_eq!(batch.value(cmd), expected.as_bytes());
        }
    }
}

#[test]
fn empty_input_is_rejected() {
    let ctx = CommandContext::new(Get::new(GetOptions::default()), &DefaultTranscoder);
    assert_eq!(
        argument_message(ctx.build(Vec::<String>::new())),
        "No items in container"
    );
    assert_eq!(argument_message(ctx.build(json!([]))), "No items in container");
    assert_eq!(argument_message(ctx.build(json!({}))), "No items in container");
}

#[test]
fn scalar_json_input_is_rejected() {
    let ctx = CommandContext::new(Get::new(GetOptions::default()), &DefaultTranscoder);
    for input in [json!(null), json!(false), json!(42), json!("user:1")] {
        assert_eq!(argument_message(ctx.build(input)), "Bad sequence type");
    }
}

#[test]
fn lying_iterators_are_caught() {
    let ctx = CommandContext::new(Get::new(GetOptions::default()), &DefaultTranscoder);
    let short = SizedIter::new(3, vec!["a", "b"].into_iter());
    assert_eq!(argument_message(ctx.build(short)), "Bad iterator");
    let long = SizedIter::new(1, vec!["a", "b"].into_iter());
    assert_eq!(argument_message(ctx.build(long)), "Bad iterator");
    let honest = SizedIter::new(2, vec!["a", "b"].into_iter());
    assert_eq!(ctx.build(honest).unwrap().len(), 2);
}

#[test]
fn empty_and_non_string_keys() {
    let ctx = CommandContext::new(Get::new(GetOptions::default()), &DefaultTranscoder);
    assert!(matches!(
        ctx.build(vec!["a", ""]),
        Err(Error::ValueFormat { .. })
    ));
    assert!(matches!(
        ctx.build(json!(["a", 1])),
        Err(Error::ValueFormat { .. })
    ));
}

#[test]
fn store_cas_defaults_to_zero_and_follows_prior_results() {
    let ctx = CommandContext::new(upsert(), &DefaultTranscoder);
    let batch = ctx.build(Items(vec![("a", json!({"n": 1}))])).unwrap();
    let cmd = batch.iter().next().unwrap();
    assert_eq!(cmd.cas, 0);
    assert_eq!(batch.value(cmd), br#"{"n":1}"#);
    // a prior result in key position
    let prior = OperationResult::new(Key::from("a"), 99, StatusCode::Success);
    let opts = Options::default().with_value("v");
    let batch = ctx
        .build(Items(vec![(KeyItem::from(&prior), opts)]))
        .unwrap();
    assert_eq!(batch.iter().next().unwrap().cas, 99);
    // a prior result as the mapping value
    let ctx = CommandContext::new(Remove::new(RemoveOptions::default()), &DefaultTranscoder);
    let batch = ctx.build(Items(vec![("a", &prior)])).unwrap();
    let cmd = batch.iter().next().unwrap();
    assert_eq!(batch.key(cmd), b"a");
    assert_eq!(cmd.cas, 99);
}

#[test]
fn prior_results_in_a_key_sequence_carry_their_cas() {
    let ctx = CommandContext::new(Remove::new(RemoveOptions::default()), &DefaultTranscoder);
    let first = OperationResult::new(Key::from("a"), 11, StatusCode::Success);
    let second = OperationResult::new(Key::from("b"), 12, StatusCode::Success);
    let batch = ctx.build(vec![&first, &second]).unwrap();
    let cmds: Vec<_> = batch.iter().collect();
    assert_eq!((batch.key(cmds[0]), cmds[0].cas), (&b"a"[..], 11));
    assert_eq!((batch.key(cmds[1]), cmds[1].cas), (&b"b"[..], 12));
    // owned results work too, and a result without a CAS falls back to the default
    let fetched = ValueResult::new(Key::from("c"), 13, StatusCode::Success, 0, None);
    let batch = ctx
        .build(vec![
            KeyItem::from(fetched),
            KeyItem::prior_without_cas("d"),
        ])
        .unwrap();
    let cmds: Vec<_> = batch.iter().collect();
    assert_eq!(cmds[0].cas, 13);
    assert_eq!(cmds[1].cas, 0);
}

#[test]
fn store_after_get_reuses_the_fetched_cas() {
    let fetched = ValueResult::new(
        Key::from("doc"),
        0xbeef,
        StatusCode::Success,
        0,
        Some(json!({"n": 1}).into()),
    );
    let ctx = CommandContext::new(
        Store::new(
            StoreMode::Replace,
            StoreOptions {
                cas: 5,
                ..Default::default()
            },
            Format::Json,
        ),
        &DefaultTranscoder,
    );
    let update = Options::default().with_value(json!({"n": 2})).with_cas(7);
    let batch = ctx.build(Items(vec![(&fetched, update)])).unwrap();
    let cmd = batch.iter().next().unwrap();
    // the result's CAS beats both the defaults and the item options
    assert_eq!(cmd.cas, 0xbeef);
    assert_eq!(batch.key(cmd), b"doc");
    assert_eq!(batch.value(cmd), br#"{"n":2}"#);
}

#[test]
fn remove_cas_defaults_and_scalars() {
    let ctx = CommandContext::new(Remove::new(RemoveOptions::default()), &DefaultTranscoder);
    let batch = ctx.build(vec!["a"]).unwrap();
    assert_eq!(batch.iter().next().unwrap().cas, 0);
    let ctx = CommandContext::new(
        Remove::new(RemoveOptions {
            cas: 5,
            ..Default::default()
        }),
        &DefaultTranscoder,
    );
    let batch = ctx.build(Items(vec![("a", 42u64), ("b", 0u64)])).unwrap();
    let cmds: Vec<_> = batch.iter().collect();
    assert_eq!(cmds[0].cas, 42);
    assert_eq!(cmds[1].cas, 0);
    let batch = ctx.build(vec!["c"]).unwrap();
    assert_eq!(batch.iter().next().unwrap().cas, 5);
    assert_eq!(
        argument_message(ctx.build(Items(vec![("a", "not a cas")]))),
        "Invalid CAS"
    );
    assert_eq!(argument_message(ctx.build(Items(vec![("a", -1i64)]))), "Invalid CAS");
}

#[test]
fn explicit_item_options_override_defaults() {
    let ctx = CommandContext::new(
        Store::new(
            StoreMode::Replace,
            StoreOptions {
                cas: 5,
                ttl: 10,
                ..Default::default()
            },
            Format::Json,
        ),
        &DefaultTranscoder,
    );
    let batch = ctx
        .build(Items(vec![
            ("a", Options::default().with_value(1u64)),
            (
                "b",
                Options::default()
                    .with_value("raw")
                    .with_format(Format::Utf8)
                    .with_cas(7)
                    .with_ttl(20),
            ),
        ]))
        .unwrap();
    let cmds: Vec<_> = batch.iter().collect();
    assert_eq!((cmds[0].cas, cmds[0].exptime), (5, 10));
    assert_eq!((cmds[1].cas, cmds[1].exptime), (7, 20));
    assert_eq!(batch.value(cmds[1]), b"raw");
    assert_eq!(cmds[1].flags, Format::Utf8.flags());
    assert_eq!(cmds[0].operation, StoreMode::Replace);
}

#[test]
fn negative_ttl_is_rejected() {
    let ctx = CommandContext::new(
        Get::new(GetOptions {
            ttl: -5,
            ..Default::default()
        }),
        &DefaultTranscoder,
    );
    assert_eq!(argument_message(ctx.build(vec!["a"])), "TTL cannot be negative");
}

#[test]
fn lock_requires_ttl() {
    let ctx = CommandContext::new(Lock::new(LockOptions::default()), &DefaultTranscoder);
    assert_eq!(argument_message(ctx.build(vec!["a"])), "Lock must have TTL");
    let ctx = CommandContext::new(
        Lock::new(LockOptions {
            ttl: 15,
            ..Default::default()
        }),
        &DefaultTranscoder,
    );
    let batch = ctx.build(vec!["a"]).unwrap();
    let cmd = batch.iter().next().unwrap();
    assert!(cmd.lock);
    assert_eq!(cmd.exptime, 15);
}

#[test]
fn counter_delta_and_initial() {
    let five = CounterOptions {
        amount: 5,
        ..Default::default()
    };
    let incr = CommandContext::new(Counter::incr(five.clone()), &DefaultTranscoder);
    let decr = CommandContext::new(Counter::decr(five), &DefaultTranscoder);
    let up = incr.build(vec!["c"]).unwrap();
    let down = decr.build(vec!["c"]).unwrap();
    let (up, down) = (up.iter().next().unwrap(), down.iter().next().unwrap());
    assert_eq!(up.delta, 5);
    assert_eq!(down.delta, -5);
    assert!(!up.create);
    let seeded = CommandContext::new(
        Counter::incr(CounterOptions {
            initial: Some(0),
            ..Default::default()
        }),
        &DefaultTranscoder,
    );
    let batch = seeded.build(vec!["c"]).unwrap();
    let cmd = batch.iter().next().unwrap();
    assert!(cmd.create);
    assert_eq!(cmd.initial, 0);
    assert_eq!(cmd.delta, 1);
}

#[test]
fn unlock_needs_cas() {
    let ctx = CommandContext::new(Unlock::new(UnlockOptions::default()), &DefaultTranscoder);
    assert_eq!(
        argument_message(ctx.build(vec!["a"])),
        "Must have CAS for unlock"
    );
    let batch = ctx
        .build(Items(vec![("a", Options::default().with_cas(42))]))
        .unwrap();
    assert_eq!(batch.iter().next().unwrap().cas, 42);
}

#[test]
fn one_bad_item_aborts_the_batch() {
    let (con, instance) = common::connection(Config::default());
    let r = con.upsert_multi(
        Items(vec![("a", json!(1)), ("", json!(2))]),
        StoreOptions::default(),
    );
    assert!(matches!(r, Err(Error::ValueFormat { .. })));
    assert!(instance.borrow().batches.is_empty());
}

#[test]
fn submissions_reach_the_instance() {
    common::init_tracing();
    let (con, instance) = common::connection(Config::default().with_quiet(true));
    let cookie = con
        .get_multi(
            vec!["a", "b"],
            GetOptions {
                quiet: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
    con.touch_multi(Items(vec![("a", 30u64)]), Default::default())
        .unwrap();
    {
        let instance = instance.borrow();
        assert_eq!(instance.batches.len(), 2);
        assert_eq!(instance.batches[0].op, "get");
        assert_eq!(instance.batches[0].keys, vec![b"a".to_vec(), b"b".to_vec()]);
        assert!(!instance.batches[0].quiet);
        assert_eq!(instance.batches[1].op, "touch");
        assert!(instance.batches[1].quiet);
    }
    assert!(!cookie.is_done());
    con.wait().unwrap();
    assert!(cookie.is_done());
    let results = cookie.take_results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].key, Key::Bytes(b"a".to_vec()));
    assert!(cookie.maybe_throw().is_ok());
}

#[test]
fn submission_status_is_raised() {
    let (con, instance) = common::connection(Config::default());
    instance.borrow_mut().submit_rc = StatusCode::TempFail;
    let e = con
        .remove_multi(vec!["a"], Default::default())
        .unwrap_err();
    assert_eq!(e, Error::status(StatusCode::TempFail, "remove"));
}

#[test]
fn append_uses_utf8_by_default() {
    let (con, instance) = common::connection(Config::new(Format::Json, lcbind::Mode::Sync));
    con.append_multi(Items(vec![("log", "line\n")]), Default::default())
        .unwrap();
    assert_eq!(instance.borrow().batches[0].op, "store");
    let e = con
        .append_multi(Items(vec![("log", json!({"not": "text"}))]), Default::default())
        .unwrap_err();
    assert!(matches!(e, Error::ValueFormat { .. }));
}
