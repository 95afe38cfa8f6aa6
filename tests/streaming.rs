mod common;

use {
    bytes::Bytes,
    lcbind::{
        native::{HttpResponse, RespGet, RespN1ql, RespViewQuery, ViewFlags},
        query::{
            n1ql::{N1qlParams, N1qlQuery},
            view::{Stale, ViewOptions, ViewQuery, ViewRow},
        },
        transcoder::FMT_JSON,
        Config, Error, Key, StatusCode, Value,
    },
    proptest::prelude::*,
    serde_json::json,
    std::{cell::RefCell, rc::Rc},
};

fn n1ql(statement: &str) -> N1qlQuery {
    N1qlQuery::new(N1qlParams::with_statement(statement).unwrap())
}

fn rows(n: usize) -> Vec<RespN1ql> {
    let mut responses: Vec<RespN1ql> = (0..n)
        .map(|i| RespN1ql::row(format!("{{\"n\":{}}}", i)))
        .collect();
    responses.push(RespN1ql::last(
        StatusCode::Success,
        Some(HttpResponse::new(200, r#"{"status":"success"}"#)),
    ));
    responses
}

/// Records the size of every flush
fn track_flushes(result: &lcbind::StreamingResult<N1qlQuery>) -> Rc<RefCell<Vec<usize>>> {
    let flushes = Rc::new(RefCell::new(Vec::new()));
    let f = flushes.clone();
    result
        .multi_result()
        .set_callback(move |_, rows| f.borrow_mut().push(rows.len()));
    flushes
}

#[test]
fn sync_fetch_returns_rows_and_body() {
    common::init_tracing();
    let (con, instance) = common::connection(Config::default());
    instance.borrow_mut().script_n1ql(rows(3));
    let result = con.n1ql_query(n1ql("SELECT n FROM nums")).unwrap();
    assert!(result.handle().is_some());
    assert!(!result.is_done());
    let fetched = result.fetch().unwrap();
    assert_eq!(fetched, vec![json!({"n": 0}), json!({"n": 1}), json!({"n": 2})]);
    assert!(result.is_done());
    assert!(result.handle().is_none());
    assert_eq!(result.http_status(), 200);
    assert_eq!(result.value(), Some(json!({"status": "success"})));
    assert_eq!(result.buffered(), 0);
    assert_eq!(
        instance.borrow().n1ql[0].body,
        json!({"statement": "SELECT n FROM nums"})
    );
}

#[test]
fn sync_iterator_yields_every_row() {
    let (con, instance) = common::connection(Config::default());
    instance.borrow_mut().script_n1ql(rows(4));
    let result = con.n1ql_query(n1ql("SELECT n FROM nums")).unwrap();
    let all: Vec<_> = result.iter().collect::<Result<_, _>>().unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(instance.borrow().waits, 1);
}

#[test]
fn sync_mode_never_flushes_to_the_callback() {
    let (con, instance) = common::connection(Config::default());
    instance.borrow_mut().script_n1ql(rows(2));
    let result = con.n1ql_query(n1ql("SELECT 1")).unwrap();
    let flushes = track_flushes(&result);
    con.wait().unwrap();
    assert!(flushes.borrow().is_empty());
    assert_eq!(result.buffered(), 2);
    assert!(result.has_parent());
}

#[test]
fn rows_per_call_zero_flushes_every_row() {
    let (con, instance) = common::connection(Config::new_async());
    instance.borrow_mut().script_n1ql(rows(3));
    let result = con.n1ql_query(n1ql("SELECT 1")).unwrap();
    assert_eq!(result.rows_per_call(), 0);
    let flushes = track_flushes(&result);
    con.wait().unwrap();
    // one flush per row, then the two completion flushes with nothing left
    assert_eq!(*flushes.borrow(), vec![1, 1, 1, 0, 0]);
    assert!(result.is_done());
    assert!(!result.has_parent());
}

#[test]
fn negative_rows_per_call_buffers_until_done() {
    let (con, instance) = common::connection(Config::new_async().with_rows_per_call(-1));
    instance.borrow_mut().script_n1ql(rows(5));
    let result = con.n1ql_query(n1ql("SELECT 1")).unwrap();
    let flushes = track_flushes(&result);
    con.wait().unwrap();
    assert_eq!(*flushes.borrow(), vec![5, 0]);
}

proptest! {
    #[test]
    fn flushes_never_exceed_threshold(n in 0usize..40, rpc in -1i64..8) {
        let (con, instance) = common::connection(Config::new_async());
        instance.borrow_mut().script_n1ql(rows(n));
        let result = con.n1ql_query(n1ql("SELECT 1")).unwrap();
        result.set_rows_per_call(rpc);
        let flushes = track_flushes(&result);
        con.wait().unwrap();
        let flushes = flushes.borrow();
        // every row is delivered exactly once
        prop_assert_eq!(flushes.iter().sum::<usize>(), n);
        // the last two flushes are the completion flushes
        prop_assert!(flushes.len() >= 2);
        let (streamed, _) = flushes.split_at(flushes.len() - 2);
        for &size in streamed {
            prop_assert!(rpc >= 0);
            prop_assert_eq!(size as i64, rpc + 1);
        }
    }
}

#[test]
fn bad_rows_are_recorded_and_skipped() {
    let (con, instance) = common::connection(Config::default());
    instance.borrow_mut().script_n1ql(vec![
        RespN1ql::row(r#"{"n":0}"#),
        RespN1ql::failed(StatusCode::TempFail),
        RespN1ql::row(r#"{"n":2}"#),
        RespN1ql::last(StatusCode::Success, None),
    ]);
    let result = con.n1ql_query(n1ql("SELECT 1")).unwrap();
    let e = result.fetch().unwrap_err();
    assert_eq!(e, Error::status(StatusCode::TempFail, "N1QL[SELECT 1]"));
    // the buffer is cleared even though the fetch failed
    assert_eq!(result.buffered(), 0);
    assert_eq!(result.multi_result().errors().len(), 1);
}

#[test]
fn undecodable_rows_are_recorded() {
    let (con, instance) = common::connection(Config::default());
    instance.borrow_mut().script_n1ql(vec![
        RespN1ql::row("{oops"),
        RespN1ql::row("[1]"),
        RespN1ql::last(StatusCode::Success, None),
    ]);
    let result = con.n1ql_query(n1ql("SELECT 1")).unwrap();
    con.wait().unwrap();
    assert_eq!(result.buffered(), 1);
    assert!(matches!(
        result.multi_result().maybe_throw(),
        Err(Error::Json(_))
    ));
}

#[test]
fn http_errors_carry_the_body() {
    let (con, instance) = common::connection(Config::default());
    instance.borrow_mut().script_n1ql(vec![RespN1ql::last(
        StatusCode::HttpError,
        Some(HttpResponse::new(
            500,
            r#"{"errors":[{"code":4000,"msg":"boom"}]}"#,
        )),
    )]);
    let result = con.n1ql_query(n1ql("SELECT 1")).unwrap();
    match result.fetch() {
        Err(Error::Http {
            rc,
            http_status,
            value,
        }) => {
            assert_eq!(rc, StatusCode::HttpError);
            assert_eq!(http_status, 500);
            assert_eq!(value, Some(json!({"errors": [{"code": 4000, "msg": "boom"}]})));
        }
        other => panic!("expected an HTTP error, got {:?}", other),
    }
}

#[test]
fn other_completion_errors_are_generic() {
    let (con, instance) = common::connection(Config::default());
    instance
        .borrow_mut()
        .script_n1ql(vec![RespN1ql::last(StatusCode::TimedOut, None)]);
    let result = con.n1ql_query(n1ql("SELECT 1")).unwrap();
    assert_eq!(
        result.fetch().unwrap_err().status_code(),
        Some(StatusCode::TimedOut)
    );
}

#[test]
fn async_errors_go_to_the_errback() {
    let (con, instance) = common::connection(Config::new_async());
    instance.borrow_mut().script_n1ql(vec![
        RespN1ql::row("1"),
        RespN1ql::failed(StatusCode::Network),
        RespN1ql::last(StatusCode::Success, None),
    ]);
    let result = con.n1ql_query(n1ql("SELECT 1")).unwrap();
    let flushes = track_flushes(&result);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    result
        .multi_result()
        .set_errback(move |_, e| s.borrow_mut().push(e));
    con.wait().unwrap();
    assert_eq!(*flushes.borrow(), vec![1, 0]);
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(seen.borrow()[0].status_code(), Some(StatusCode::Network));
    assert!(!result.has_parent());
}

#[test]
fn submission_failure_is_raised() {
    let (con, instance) = common::connection(Config::default());
    instance.borrow_mut().submit_rc = StatusCode::InvalidArgs;
    let e = con.n1ql_query(n1ql("SELECT 1")).unwrap_err();
    assert_eq!(e, Error::status(StatusCode::InvalidArgs, "N1QL[SELECT 1]"));
}

#[test]
fn fetch_without_connection() {
    let (con, instance) = common::connection(Config::default());
    instance.borrow_mut().script_n1ql(rows(1));
    let result = con.n1ql_query(n1ql("SELECT 1")).unwrap();
    drop(con);
    drop(instance);
    assert_eq!(result.fetch().unwrap_err(), Error::Disconnected);
}

#[test]
fn view_rows_map_present_fields_only() {
    let (con, instance) = common::connection(Config::default());
    let mut with_doc = RespViewQuery::row(r#""stout""#, "null", "beer:2");
    with_doc.docresp = Some(RespGet {
        rc: StatusCode::Success,
        cas: 11,
        itmflags: FMT_JSON,
        value: Bytes::from_static(br#"{"name":"stout"}"#),
    });
    instance.borrow_mut().script_view(vec![
        RespViewQuery::row(r#""ale""#, "1", "beer:1"),
        with_doc,
        RespViewQuery {
            key: Some(Bytes::from_static(b"[2015]")),
            value: Some(Bytes::from_static(b"3")),
            ..Default::default()
        },
        RespViewQuery::last(
            StatusCode::Success,
            Some(Bytes::from_static(br#"{"total_rows":3}"#)),
            Some(HttpResponse::new(200, "ignored")),
        ),
    ]);
    let query = ViewQuery::new("beer", "by_style").with_options(ViewOptions {
        limit: Some(3),
        stale: Some(Stale::Ok),
        include_docs: Some(true),
        ..Default::default()
    });
    let result = con.query_view(query).unwrap();
    assert_eq!(result.key(), "VIEW[beer/by_style]");
    let rows = result.fetch().unwrap();
    assert_eq!(
        rows[0],
        ViewRow {
            key: Some(json!("ale")),
            value: Some(json!(1)),
            id: Some("beer:1".to_owned()),
            doc: None,
        }
    );
    let doc = rows[1].doc.as_ref().unwrap();
    assert_eq!(doc.key, Key::from("beer:2"));
    assert_eq!(doc.cas, 11);
    assert_eq!(doc.value, Some(Value::Json(json!({"name": "stout"}))));
    assert_eq!(rows[2].id, None);
    assert_eq!(rows[2].key, Some(json!([2015])));
    // the view metadata wins over the HTTP body
    assert_eq!(result.value(), Some(json!({"total_rows": 3})));
    let instance = instance.borrow();
    let request = &instance.views[0];
    assert_eq!(request.ddoc, "beer");
    assert_eq!(request.optstr.as_deref(), Some("limit=3&stale=ok"));
    assert_eq!(request.postdata, None);
    assert!(request.flags.contains(ViewFlags::INCLUDE_DOCS));
}

#[test]
fn view_keys_are_posted() {
    let (con, instance) = common::connection(Config::default());
    let query = ViewQuery::new("d", "v").with_options(ViewOptions {
        keys: Some(vec![json!("a"), json!(["b", 1])]),
        ..Default::default()
    });
    let result = con.query_view(query).unwrap();
    assert!(result.fetch().unwrap().is_empty());
    let instance = instance.borrow();
    let request = &instance.views[0];
    assert_eq!(request.optstr, None);
    assert_eq!(request.postdata.as_deref(), Some(r#"{"keys":["a",["b",1]]}"#));
}

#[test]
fn query_handles_are_distinct() {
    let (con, _instance) = common::connection(Config::default());
    let a = con.n1ql_query(n1ql("SELECT 1")).unwrap();
    let b = con.query_view(ViewQuery::new("d", "v")).unwrap();
    assert_ne!(a.handle(), b.handle());
    con.wait().unwrap();
    assert!(a.is_done() && b.is_done());
}
