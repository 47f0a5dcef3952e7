use super::{Cell, Header, Report, ReportNode};
use crate::config::DEFAULT_MAX_DEPTH;
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

impl Report {
    /// Decode a raw evaluation payload.
    ///
    /// Decoding never recurses: lines are opened on an explicit stack, so a
    /// hostile payload fails with [`Error::MalformedTree`] once it nests deeper
    /// than `max_depth`, instead of exhausting the call stack. A `subLines`
    /// entry that is not an object is skipped (and counted), not fatal.
    pub fn from_value(payload: &Value, max_depth: usize) -> Result<Self> {
        let payload = payload.as_object().ok_or_else(|| {
            Error::InvalidPayload(format!("expected a JSON object, found {}", kind(payload)))
        })?;

        let headers = match payload.get("headers") {
            Some(Value::Array(headers)) => headers.iter().map(de_header).collect(),
            None | Some(Value::Null) => vec![],
            Some(other) => {
                warn!("ignoring headers; expected an array, found {}", kind(other));
                vec![]
            }
        };

        let (root, skipped_nodes) = match payload.get("resultLine") {
            Some(line @ Value::Object(_)) => de_tree(line, max_depth)?,
            _ => {
                debug!("payload has no resultLine; treating it as an empty report");
                (ReportNode::default(), 0)
            }
        };

        Ok(Report {
            headers,
            root,
            skipped_nodes,
        })
    }

    /// Decode a payload straight from its JSON text.
    ///
    /// serde_json's own nesting limit is lifted and the stack grows on demand
    /// while parsing, so `max_depth` alone decides how deep a report may go.
    pub fn parse(text: &str, max_depth: usize) -> Result<Self> {
        let mut json = serde_json::Deserializer::from_str(text);
        json.disable_recursion_limit();
        let payload = Value::deserialize(serde_stacker::Deserializer::new(&mut json))?;
        json.end()?;
        Report::from_value(&payload, max_depth)
    }
}

impl TryFrom<Value> for Report {
    type Error = Error;

    fn try_from(payload: Value) -> Result<Self> {
        Report::from_value(&payload, DEFAULT_MAX_DEPTH)
    }
}

/// Headers arrive as `{"name": .., "command": ..}` objects or as bare strings;
/// a bare header supplies both the name and the command.
fn de_header(value: &Value) -> Header {
    match value {
        Value::Object(map) => Header {
            display_name: de_text(map.get("name")),
            command: de_text(map.get("command")),
        },
        Value::String(s) => Header::new(s, s),
        other => {
            let text = other.to_string();
            Header::new(&text, &text)
        }
    }
}

fn de_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// -------------------------------------------------------------------------------------------------
// line tree

/// A line whose children are still being decoded.
struct Frame<'a> {
    node: ReportNode,
    pending: std::slice::Iter<'a, Value>,
}

impl<'a> Frame<'a> {
    fn open(line: &'a Value) -> Self {
        let name = match line.get("name") {
            Some(Value::String(s)) => Some(s.clone()),
            None | Some(Value::Null) => None,
            Some(other) => {
                trace!("line name is not a string: {other}");
                Some(other.to_string())
            }
        };

        let values = match line.get("values") {
            Some(Value::Array(cells)) => cells.iter().cloned().map(Cell::from).collect(),
            None | Some(Value::Null) => vec![],
            Some(other) => {
                warn!(
                    "line {name:?} has malformed values ({}); treating them as empty",
                    kind(other)
                );
                vec![]
            }
        };

        let pending = match line.get("subLines") {
            Some(Value::Array(children)) => children.iter(),
            _ => Default::default(),
        };

        Frame {
            node: ReportNode {
                name,
                values,
                children: vec![],
            },
            pending,
        }
    }
}

fn de_tree(root: &Value, max_depth: usize) -> Result<(ReportNode, usize)> {
    let mut skipped = 0;
    let mut stack = vec![Frame::open(root)];

    while let Some(frame) = stack.last_mut() {
        match frame.pending.next() {
            Some(child @ Value::Object(_)) => {
                // the root sits at depth 0, so the child lands at `stack.len()`
                let depth = stack.len();
                if depth > max_depth {
                    return Err(Error::MalformedTree {
                        depth,
                        limit: max_depth,
                    });
                }
                stack.push(Frame::open(child));
            }
            Some(other) => {
                skipped += 1;
                warn!("skipping malformed line; expected an object, found {}", kind(other));
            }
            None => {
                let finished = match stack.pop() {
                    Some(frame) => frame.node,
                    None => break,
                };
                match stack.last_mut() {
                    Some(parent) => parent.node.children.push(finished),
                    None => return Ok((finished, skipped)),
                }
            }
        }
    }

    Ok((ReportNode::default(), skipped))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
