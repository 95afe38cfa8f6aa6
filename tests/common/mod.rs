#![allow(dead_code)]

use {
    lcbind::{
        command::CommandBatch,
        native::{
            Cookie, CounterCmd, GetCmd, Instance, KeyedCmd, N1qlCmd, N1qlFlags, RemoveCmd,
            RespN1ql, RespViewQuery, RowCallback, StoreCmd, TouchCmd, UnlockCmd, ViewFlags,
            ViewQueryCmd,
        },
        result::ValueResult,
        Config, Connection, DefaultTranscoder, Key, StatusCode,
    },
    std::{cell::RefCell, collections::VecDeque, rc::Rc},
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submitted {
    pub op: &'static str,
    pub keys: Vec<Vec<u8>>,
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewRequest {
    pub ddoc: String,
    pub view: String,
    pub optstr: Option<String>,
    pub postdata: Option<String>,
    pub flags: ViewFlags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct N1qlRequest {
    pub body: serde_json::Value,
    pub flags: N1qlFlags,
}

fn text(b: &[u8]) -> String {
    String::from_utf8_lossy(b).into_owned()
}

/// An in-memory instance. Submissions are recorded; every key gets a successful result and
/// every query gets its scripted responses, all delivered from `wait`
#[derive(Default)]
pub struct Scripted {
    pub submit_rc: StatusCode,
    pub batches: Vec<Submitted>,
    pub views: Vec<ViewRequest>,
    pub n1ql: Vec<N1qlRequest>,
    pub waits: usize,
    view_script: VecDeque<Vec<RespViewQuery>>,
    n1ql_script: VecDeque<Vec<RespN1ql>>,
    pending_kv: Vec<(Cookie, Vec<Vec<u8>>)>,
    pending_views: Vec<(RowCallback<RespViewQuery>, Vec<RespViewQuery>)>,
    pending_n1ql: Vec<(RowCallback<RespN1ql>, Vec<RespN1ql>)>,
    next_cas: u64,
}

impl Scripted {
    pub fn new() -> Self {
        Self::default()
    }
    /// Queue the responses for the next view query
    pub fn script_view(&mut self, responses: Vec<RespViewQuery>) {
        self.view_script.push_back(responses);
    }
    /// Queue the responses for the next N1QL query
    pub fn script_n1ql(&mut self, responses: Vec<RespN1ql>) {
        self.n1ql_script.push_back(responses);
    }
    fn record<C: KeyedCmd>(
        &mut self,
        op: &'static str,
        cookie: &Cookie,
        batch: &CommandBatch<C>,
    ) -> StatusCode {
        if self.submit_rc != StatusCode::Success {
            return self.submit_rc;
        }
        let keys: Vec<Vec<u8>> = batch.iter().map(|c| batch.key(c).to_vec()).collect();
        self.batches.push(Submitted {
            op,
            keys: keys.clone(),
            quiet: batch.quiet(),
        });
        self.pending_kv.push((cookie.clone(), keys));
        StatusCode::Success
    }
}

impl Instance for Scripted {
    fn store(&mut self, cookie: &Cookie, batch: &CommandBatch<StoreCmd>) -> StatusCode {
        self.record("store", cookie, batch)
    }
    fn get(&mut self, cookie: &Cookie, batch: &CommandBatch<GetCmd>) -> StatusCode {
        self.record("get", cookie, batch)
    }
    fn remove(&mut self, cookie: &Cookie, batch: &CommandBatch<RemoveCmd>) -> StatusCode {
        self.record("remove", cookie, batch)
    }
    fn counter(&mut self, cookie: &Cookie, batch: &CommandBatch<CounterCmd>) -> StatusCode {
        self.record("counter", cookie, batch)
    }
    fn unlock(&mut self, cookie: &Cookie, batch: &CommandBatch<UnlockCmd>) -> StatusCode {
        self.record("unlock", cookie, batch)
    }
    fn touch(&mut self, cookie: &Cookie, batch: &CommandBatch<TouchCmd>) -> StatusCode {
        self.record("touch", cookie, batch)
    }
    fn view_query(&mut self, cmd: ViewQueryCmd) -> StatusCode {
        if self.submit_rc != StatusCode::Success {
            return self.submit_rc;
        }
        self.views.push(ViewRequest {
            ddoc: text(&cmd.ddoc),
            view: text(&cmd.view),
            optstr: cmd.optstr.as_deref().map(text),
            postdata: cmd.postdata.as_deref().map(text),
            flags: cmd.cmdflags,
        });
        let responses = self
            .view_script
            .pop_front()
            .unwrap_or_else(|| vec![RespViewQuery::last(StatusCode::Success, None, None)]);
        self.pending_views.push((cmd.callback, responses));
        StatusCode::Success
    }
    fn n1ql_query(&mut self, cmd: N1qlCmd) -> StatusCode {
        if self.submit_rc != StatusCode::Success {
            return self.submit_rc;
        }
        self.n1ql.push(N1qlRequest {
            body: serde_json::from_slice(&cmd.query).unwrap(),
            flags: cmd.cmdflags,
        });
        let responses = self
            .n1ql_script
            .pop_front()
            .unwrap_or_else(|| vec![RespN1ql::last(StatusCode::Success, None)]);
        self.pending_n1ql.push((cmd.callback, responses));
        StatusCode::Success
    }
    fn wait(&mut self) {
        self.waits += 1;
        for (cookie, keys) in std::mem::take(&mut self.pending_kv) {
            for key in keys {
                self.next_cas += 1;
                cookie.push_result(ValueResult::new(
                    Key::Bytes(key),
                    self.next_cas,
                    StatusCode::Success,
                    0,
                    None,
                ));
            }
            cookie.set_done();
        }
        for (mut callback, responses) in std::mem::take(&mut self.pending_views) {
            for resp in responses {
                callback(&resp);
            }
        }
        for (mut callback, responses) in std::mem::take(&mut self.pending_n1ql) {
            for resp in responses {
                callback(&resp);
            }
        }
    }
}

/// A connection over a shared scripted instance, so that tests can look at what was submitted
pub fn connection(config: Config) -> (Connection, Rc<RefCell<Scripted>>) {
    let instance = Rc::new(RefCell::new(Scripted::new()));
    let con = Connection::from_shared(instance.clone(), Rc::new(DefaultTranscoder), config);
    (con, instance)
}
