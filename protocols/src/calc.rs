//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Remote integer calculator
//!
//! Each request is one line, `<op> <a> <b>`, answered by one line holding the
//! decimal result. A request that cannot be parsed or evaluated is answered
//! with an `ERROR ...` line and the connection is closed.

use async_trait::async_trait;
use linewire_service::{LineConnection, LineProtocol, ProtocolFactory, Result, ServiceError};
use std::fmt;
use std::num::{IntErrorKind, ParseIntError};
use std::str::FromStr;
use tracing::debug;

/// Binary integer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `add a b`
    Add,
    /// `subtract a b`
    Subtract,
    /// `multiply a b`
    Multiply,
    /// `divide a b`, rounding toward negative infinity
    Divide,
}

impl Operation {
    const TABLE: [(&'static str, Operation); 4] = [
        ("add", Operation::Add),
        ("subtract", Operation::Subtract),
        ("multiply", Operation::Multiply),
        ("divide", Operation::Divide),
    ];

    /// Wire name of the operation
    pub fn name(self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
        }
    }

    /// Apply the operation
    ///
    /// # Errors
    ///
    /// [`ServiceError::DivisionByZero`] for `divide _ 0`, and
    /// [`ServiceError::ArithmeticOverflow`] when the result does not fit in
    /// an `i64`.
    pub fn apply(self, lhs: i64, rhs: i64) -> Result<i64> {
        let value = match self {
            Operation::Add => lhs.checked_add(rhs),
            Operation::Subtract => lhs.checked_sub(rhs),
            Operation::Multiply => lhs.checked_mul(rhs),
            Operation::Divide => return floor_div(lhs, rhs),
        };
        value.ok_or(ServiceError::ArithmeticOverflow)
    }
}

fn floor_div(lhs: i64, rhs: i64) -> Result<i64> {
    if rhs == 0 {
        return Err(ServiceError::DivisionByZero);
    }
    let quotient = lhs
        .checked_div(rhs)
        .ok_or(ServiceError::ArithmeticOverflow)?;
    if lhs % rhs != 0 && ((lhs < 0) != (rhs < 0)) {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}

impl FromStr for Operation {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::TABLE
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, op)| *op)
            .ok_or_else(|| ServiceError::MalformedRequest(format!("unknown operation '{s}'")))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed calculation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// Operation to apply
    pub op: Operation,
    /// Left operand
    pub lhs: i64,
    /// Right operand
    pub rhs: i64,
}

impl Request {
    /// Evaluate the request
    pub fn evaluate(&self) -> Result<i64> {
        self.op.apply(self.lhs, self.rhs)
    }
}

impl FromStr for Request {
    type Err = ServiceError;

    fn from_str(line: &str) -> Result<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let [op, lhs, rhs] = tokens.as_slice() else {
            return Err(ServiceError::MalformedRequest(format!(
                "expected '<op> <a> <b>', got {} tokens",
                tokens.len()
            )));
        };

        let op = op.parse()?;
        match (lhs.parse::<i64>(), rhs.parse::<i64>()) {
            (Ok(lhs), Ok(rhs)) => Ok(Request { op, lhs, rhs }),
            (a, b) if is_integer(&a) && is_integer(&b) => Err(ServiceError::ArithmeticOverflow),
            _ => Err(ServiceError::MalformedRequest(format!(
                "couldn't coerce arguments to integers: {lhs} {rhs}"
            ))),
        }
    }
}

/// Integer syntax, possibly out of `i64` range
fn is_integer(parsed: &std::result::Result<i64, ParseIntError>) -> bool {
    match parsed {
        Ok(_) => true,
        Err(e) => matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow),
    }
}

/// Builds [`CalcProtocol`] instances
#[derive(Debug, Clone, Copy, Default)]
pub struct CalcFactory;

#[async_trait]
impl ProtocolFactory for CalcFactory {
    fn build_protocol(&self, _conn: &LineConnection) -> Box<dyn LineProtocol> {
        Box::new(CalcProtocol)
    }
}

/// Stateless request/response calculator
#[derive(Debug, Clone, Copy, Default)]
pub struct CalcProtocol;

#[async_trait]
impl LineProtocol for CalcProtocol {
    async fn on_line(&mut self, conn: &LineConnection, line: String) -> Result<()> {
        let request: Request = line.parse()?;
        let result = request.evaluate()?;
        debug!(connection_id = %conn.id(), ?request, result, "Calculated");
        conn.send_line(result.to_string())
    }

    async fn on_error(&mut self, conn: &LineConnection, error: &ServiceError) {
        if error.is_request_error() {
            // the connection closes right after; a full queue just loses the diagnostic
            let _ = conn.send_line(format!("ERROR {error}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linewire_service::ConnectionId;
    use std::net::SocketAddr;

    fn eval(line: &str) -> Result<i64> {
        line.parse::<Request>()?.evaluate()
    }

    #[test]
    fn test_basic_operations() {
        assert_eq!(eval("add 3 4").unwrap(), 7);
        assert_eq!(eval("subtract 3 4").unwrap(), -1);
        assert_eq!(eval("multiply -6 7").unwrap(), -42);
        assert_eq!(eval("divide 7 2").unwrap(), 3);
        assert_eq!(eval("  add   1\t2 ").unwrap(), 3);
    }

    #[test]
    fn test_divide_rounds_down() {
        assert_eq!(eval("divide -7 2").unwrap(), -4);
        assert_eq!(eval("divide 7 -2").unwrap(), -4);
        assert_eq!(eval("divide -7 -2").unwrap(), 3);
        assert_eq!(eval("divide -8 2").unwrap(), -4);
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(eval("divide 5 0"), Err(ServiceError::DivisionByZero)));
    }

    #[test]
    fn test_overflow() {
        let max = i64::MAX;
        assert!(matches!(
            eval(&format!("add {max} 1")),
            Err(ServiceError::ArithmeticOverflow)
        ));
        assert!(matches!(
            eval(&format!("divide {} -1", i64::MIN)),
            Err(ServiceError::ArithmeticOverflow)
        ));
    }

    #[test]
    fn test_out_of_range_operands() {
        for line in [
            "add 99999999999999999999 1",
            "subtract 1 -99999999999999999999",
            "multiply 99999999999999999999 99999999999999999999",
        ] {
            assert!(
                matches!(line.parse::<Request>(), Err(ServiceError::ArithmeticOverflow)),
                "{line:?} should overflow"
            );
        }
        // a non-integer operand is still malformed
        assert!(matches!(
            "add 99999999999999999999 x".parse::<Request>(),
            Err(ServiceError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_malformed_requests() {
        for line in [
            "add x y",
            "add 1",
            "add 1 2 3",
            "",
            "power 2 3",
            "ADD 1 2",
            "add 1.5 2",
        ] {
            assert!(
                matches!(eval(line), Err(ServiceError::MalformedRequest(_))),
                "{line:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_operation_names() {
        for (name, op) in Operation::TABLE {
            assert_eq!(op.name(), name);
            assert_eq!(name.parse::<Operation>().unwrap(), op);
            assert_eq!(op.to_string(), name);
        }
    }

    #[tokio::test]
    async fn test_protocol_replies_and_diagnostics() {
        let addr: SocketAddr = "127.0.0.1:8110".parse().unwrap();
        let (conn, mut rx) = LineConnection::new(ConnectionId::new(1), addr, addr, 8);
        let mut calc = CalcProtocol;

        calc.on_line(&conn, "multiply 6 7".into()).await.unwrap();
        assert_eq!(rx.try_recv().unwrap(), "42");

        let err = calc.on_line(&conn, "divide 1 0".into()).await.unwrap_err();
        calc.on_error(&conn, &err).await;
        assert_eq!(rx.try_recv().unwrap(), "ERROR division by zero");

        let err = calc.on_line(&conn, "add x y".into()).await.unwrap_err();
        calc.on_error(&conn, &err).await;
        assert_eq!(
            rx.try_recv().unwrap(),
            "ERROR malformed request: couldn't coerce arguments to integers: x y"
        );

        calc.on_error(&conn, &ServiceError::Timeout).await;
        assert!(rx.try_recv().is_err());
    }
}
