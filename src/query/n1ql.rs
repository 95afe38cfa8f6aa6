/*
 * Copyright 2023, Sayan Nandan <nandansayan@outlook.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
*/

//! # N1QL queries
//!
//! An [`N1qlParams`] accumulates the statement, the options and the arguments of a query and
//! encodes them into the JSON request body. Every row of an [`N1qlQuery`] is one JSON value.
//!
//! ## Example
//! ```
//! use lcbind::query::n1ql::{N1qlParams, QueryType};
//!
//! let mut params = N1qlParams::new();
//! params
//!     .set_statement("SELECT * FROM `beers` WHERE abv > $abv", QueryType::Statement)
//!     .unwrap();
//! params.set_named_arg("abv", "5.5").unwrap();
//! let body: serde_json::Value = serde_json::from_slice(&params.encode().unwrap()).unwrap();
//! assert_eq!(body["$abv"], serde_json::json!(5.5));
//! ```

use {
    super::QueryProtocol,
    crate::{
        error::{ClientResult, Error},
        native::{Instance, N1qlCmd, N1qlFlags, QueryHandle, RespN1ql, RowCallback},
        status::StatusCode,
        transcoder::Transcoder,
    },
    bytes::Bytes,
    core::time::Duration,
    serde_json::{Map, Value as Json},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// How the statement text is to be interpreted
pub enum QueryType {
    /// Plain N1QL text
    #[default]
    Statement,
    /// The name (or encoded plan) of a prepared statement
    Prepared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Index consistency required by a query
pub enum ScanConsistency {
    NotBounded,
    RequestPlus,
    StatementPlus,
}

impl ScanConsistency {
    fn as_str(&self) -> &'static str {
        match self {
            Self::NotBounded => "not_bounded",
            Self::RequestPlus => "request_plus",
            Self::StatementPlus => "statement_plus",
        }
    }
}

fn invalid(what: &str) -> Error {
    Error::status(StatusCode::InvalidArgs, what)
}

fn parse_json(what: &str, text: &str) -> ClientResult<Json> {
    serde_json::from_str(text).map_err(|_| invalid(what))
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Query parameters
///
/// Option and argument values are given as JSON text, so `"5"` is a number and `"\"5\""` is a
/// string.
pub struct N1qlParams {
    statement: Option<(String, QueryType)>,
    options: Map<String, Json>,
    named: Map<String, Json>,
    positional: Vec<Json>,
}

impl N1qlParams {
    pub fn new() -> Self {
        Self::default()
    }
    /// Create parameters holding `statement`
    pub fn with_statement(statement: &str) -> ClientResult<Self> {
        let mut params = Self::new();
        params.set_statement(statement, QueryType::Statement)?;
        Ok(params)
    }
    pub fn set_statement(&mut self, text: &str, query_type: QueryType) -> ClientResult<()> {
        if text.is_empty() {
            return Err(invalid("N1QL statement"));
        }
        self.statement = Some((text.to_owned(), query_type));
        Ok(())
    }
    /// Set a request level option, such as `scan_consistency`
    pub fn set_option(&mut self, name: &str, value: &str) -> ClientResult<()> {
        if name.is_empty() {
            return Err(invalid("N1QL option"));
        }
        let value = parse_json(name, value)?;
        self.options.insert(name.to_owned(), value);
        Ok(())
    }
    /// Set a named argument. The `$` prefix is added if it is missing
    pub fn set_named_arg(&mut self, name: &str, value: &str) -> ClientResult<()> {
        if name.is_empty() || name == "$" {
            return Err(invalid("N1QL named argument"));
        }
        let value = parse_json(name, value)?;
        let name = if name.starts_with('$') {
            name.to_owned()
        } else {
            format!("${}", name)
        };
        self.named.insert(name, value);
        Ok(())
    }
    pub fn add_positional_arg(&mut self, value: &str) -> ClientResult<()> {
        let value = parse_json("N1QL positional argument", value)?;
        self.positional.push(value);
        Ok(())
    }
    pub fn set_consistency(&mut self, consistency: ScanConsistency) {
        self.options.insert(
            "scan_consistency".to_owned(),
            Json::from(consistency.as_str()),
        );
    }
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.options.insert(
            "timeout".to_owned(),
            Json::from(format!("{}ms", timeout.as_millis())),
        );
    }
    pub fn set_client_context_id(&mut self, id: &str) {
        self.options
            .insert("client_context_id".to_owned(), Json::from(id));
    }
    /// Reset to empty
    pub fn clear(&mut self) {
        *self = Self::default();
    }
    pub fn statement(&self) -> Option<&str> {
        self.statement.as_ref().map(|(s, _)| s.as_str())
    }
    /// Encode into the request body
    pub fn encode(&self) -> ClientResult<Bytes> {
        let (text, query_type) = self
            .statement
            .as_ref()
            .ok_or_else(|| invalid("N1QL statement"))?;
        let mut body = self.options.clone();
        body.extend(self.named.iter().map(|(k, v)| (k.clone(), v.clone())));
        if !self.positional.is_empty() {
            body.insert("args".to_owned(), Json::Array(self.positional.clone()));
        }
        let field = match query_type {
            QueryType::Statement => "statement",
            QueryType::Prepared => "prepared",
        };
        body.insert(field.to_owned(), Json::from(text.as_str()));
        Ok(Bytes::from(serde_json::to_vec(&Json::Object(body))?))
    }
}

#[derive(Debug, Clone)]
pub struct N1qlQuery {
    params: N1qlParams,
    prepare: bool,
    cross_bucket: bool,
}

impl N1qlQuery {
    pub fn new(params: N1qlParams) -> Self {
        Self {
            params,
            prepare: false,
            cross_bucket: false,
        }
    }
    /// Prepare the statement and cache its plan
    pub fn prepare(mut self, prepare: bool) -> Self {
        self.prepare = prepare;
        self
    }
    /// Authenticate against every bucket the statement touches
    pub fn cross_bucket(mut self, cross_bucket: bool) -> Self {
        self.cross_bucket = cross_bucket;
        self
    }
    pub fn params(&self) -> &N1qlParams {
        &self.params
    }
    fn flags(&self) -> N1qlFlags {
        let mut flags = N1qlFlags::empty();
        if self.prepare {
            flags |= N1qlFlags::PREPCACHE;
        }
        if self.cross_bucket {
            flags |= N1qlFlags::MULTIAUTH;
        }
        flags
    }
}

impl QueryProtocol for N1qlQuery {
    type Cmd = N1qlCmd;
    type Response = RespN1ql;
    type Row = Json;
    fn key(&self) -> String {
        format!("N1QL[{}]", self.params.statement().unwrap_or_default())
    }
    fn init_command(
        &self,
        handle: QueryHandle,
        callback: RowCallback<RespN1ql>,
    ) -> ClientResult<N1qlCmd> {
        Ok(N1qlCmd {
            query: self.params.encode()?,
            cmdflags: self.flags(),
            handle,
            callback,
        })
    }
    fn query(instance: &mut dyn Instance, cmd: N1qlCmd) -> StatusCode {
        instance.n1ql_query(cmd)
    }
    fn process_resp(&self, resp: &RespN1ql, _: &dyn Transcoder) -> ClientResult<Option<Json>> {
        match resp.row.as_deref() {
            Some(row) if !row.is_empty() => Ok(Some(serde_json::from_slice(row)?)),
            _ => Ok(None),
        }
    }
}

#[test]
fn t_params_encode() {
    let mut params = N1qlParams::new();
    params
        .set_statement("SELECT $1, $name", QueryType::Statement)
        .unwrap();
    params.add_positional_arg("1").unwrap();
    params.set_named_arg("$name", r#""x""#).unwrap();
    params.set_consistency(ScanConsistency::RequestPlus);
    params.set_timeout(Duration::from_secs(2));
    let body: Json = serde_json::from_slice(&params.encode().unwrap()).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "statement": "SELECT $1, $name",
            "args": [1],
            "$name": "x",
            "scan_consistency": "request_plus",
            "timeout": "2000ms",
        })
    );
}

#[test]
fn t_params_invalid_args() {
    let mut params = N1qlParams::new();
    assert_eq!(
        params.encode().unwrap_err().status_code(),
        Some(StatusCode::InvalidArgs)
    );
    assert!(params.set_statement("", QueryType::Statement).is_err());
    assert_eq!(
        params.set_option("timeout", "not json").unwrap_err().status_code(),
        Some(StatusCode::InvalidArgs)
    );
    params.set_statement("p1", QueryType::Prepared).unwrap();
    params.add_positional_arg("true").unwrap();
    params.clear();
    assert_eq!(params, N1qlParams::default());
}

#[test]
fn t_flags() {
    let q = N1qlQuery::new(N1qlParams::default())
        .prepare(true)
        .cross_bucket(true);
    assert!(q.flags().contains(N1qlFlags::PREPCACHE | N1qlFlags::MULTIAUTH));
    assert_eq!(q.key(), "N1QL[]");
}
