//! XML-RPC payload codec
//!
//! Encodes `methodCall` documents for outgoing requests and decodes
//! `methodResponse` documents (normal results and faults) into [`Value`]s.
//! Text is always UTF-8.
//!
//! # Example
//!
//! ```
//! use supervisor_common::protocol::{MethodResponse, RpcRequest, Value, XmlRpcCodec};
//!
//! let request = RpcRequest::new("supervisor", "getProcessInfo", "cat");
//! let body = XmlRpcCodec::encode_request(&request).unwrap();
//! assert!(String::from_utf8(body).unwrap().contains("supervisor.getProcessInfo"));
//!
//! let response = XmlRpcCodec::decode_response(
//!     b"<methodResponse><params><param><value><boolean>1</boolean></value></param></params></methodResponse>",
//! ).unwrap();
//! assert_eq!(response, MethodResponse::Success(Value::Bool(true)));
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;

use base64::Engine as _;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::error::{Result, SupervisorError};
use super::fault::{Fault, FAULT_CODE_KEY, FAULT_STRING_KEY};
use super::requests::RpcRequest;
use super::value::Value;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

/// A decoded `methodResponse`.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    Success(Value),
    Fault(Fault),
}

impl MethodResponse {
    /// Converts the response into the call result, turning faults into errors.
    ///
    /// A `<params>` result that is itself a bare fault struct is treated as a
    /// fault too, so a fault can never reach the caller as a success value.
    pub fn into_result(self) -> Result<Value> {
        match self {
            MethodResponse::Success(value) => match Fault::from_value(&value) {
                Some(fault) => Err(SupervisorError::Fault(fault)),
                None => Ok(value),
            },
            MethodResponse::Fault(fault) => Err(SupervisorError::Fault(fault)),
        }
    }
}

/// XML-RPC encoder/decoder.
pub struct XmlRpcCodec;

impl XmlRpcCodec {
    /// Encodes a request as a `methodCall` document.
    pub fn encode_request(request: &RpcRequest) -> Result<Vec<u8>> {
        Self::encode_call(&request.method_name(), &request.params)
    }

    /// Encodes a `methodCall` for an already qualified method name.
    pub fn encode_call(method_name: &str, params: &[Value]) -> Result<Vec<u8>> {
        if method_name.is_empty() {
            return Err(SupervisorError::Encoding("empty method name".to_string()));
        }

        let mut out = String::with_capacity(256);
        out.push_str(XML_DECLARATION);
        out.push_str("<methodCall><methodName>");
        out.push_str(&escape(method_name));
        out.push_str("</methodName><params>");
        for param in params {
            out.push_str("<param>");
            write_value(&mut out, param)?;
            out.push_str("</param>");
        }
        out.push_str("</params></methodCall>");

        Ok(out.into_bytes())
    }

    /// Encodes a `methodResponse` document.
    pub fn encode_response(response: &MethodResponse) -> Result<Vec<u8>> {
        let mut out = String::with_capacity(256);
        out.push_str(XML_DECLARATION);
        out.push_str("<methodResponse>");
        match response {
            MethodResponse::Success(value) => {
                out.push_str("<params><param>");
                write_value(&mut out, value)?;
                out.push_str("</param></params>");
            }
            MethodResponse::Fault(fault) => {
                out.push_str("<fault>");
                write_value(&mut out, &fault.to_value())?;
                out.push_str("</fault>");
            }
        }
        out.push_str("</methodResponse>");

        Ok(out.into_bytes())
    }

    /// Decodes a `methodResponse` document.
    ///
    /// A body without any markup that is a bare boolean or number literal
    /// (`true`, `0`, `1.5`) is accepted as that value.
    pub fn decode_response(body: &[u8]) -> Result<MethodResponse> {
        let trimmed = body.trim_ascii();
        if trimmed.first().is_some_and(|&b| b != b'<') {
            return bare_scalar(trimmed).map(MethodResponse::Success);
        }

        let mut decoder = Decoder::new(body);
        decoder.expect_start("methodResponse")?;

        let response = match decoder.next()? {
            Event::Start(e) if e.name().as_ref() == b"params" => {
                decoder.expect_start("param")?;
                decoder.expect_start("value")?;
                let value = decoder.value_body()?;
                decoder.expect_end("param")?;
                decoder.expect_end("params")?;
                MethodResponse::Success(value)
            }
            Event::Empty(e) if e.name().as_ref() == b"params" => MethodResponse::Success(Value::Nil),
            Event::Start(e) if e.name().as_ref() == b"fault" => {
                decoder.expect_start("value")?;
                let value = decoder.value_body()?;
                decoder.expect_end("fault")?;
                MethodResponse::Fault(fault_from_struct(&value)?)
            }
            other => return Err(unexpected("<params> or <fault>", &other)),
        };

        decoder.expect_end("methodResponse")?;
        Ok(response)
    }

    /// Decodes a `methodCall` document.
    pub fn decode_request(body: &[u8]) -> Result<RpcRequest> {
        let mut decoder = Decoder::new(body);
        decoder.expect_start("methodCall")?;
        decoder.expect_start("methodName")?;
        let method_name = decoder.text_until("methodName")?;

        let (namespace, method) = method_name.split_once('.').ok_or_else(|| {
            SupervisorError::Encoding(format!("method name '{}' has no namespace", method_name))
        })?;

        let mut params = Vec::new();
        match decoder.next()? {
            Event::Start(e) if e.name().as_ref() == b"params" => loop {
                match decoder.next()? {
                    Event::Start(e) if e.name().as_ref() == b"param" => {
                        decoder.expect_start("value")?;
                        params.push(decoder.value_body()?);
                        decoder.expect_end("param")?;
                    }
                    Event::End(e) if e.name().as_ref() == b"params" => break,
                    other => return Err(unexpected("<param>", &other)),
                }
            },
            Event::Empty(e) if e.name().as_ref() == b"params" => {}
            other => return Err(unexpected("<params>", &other)),
        }
        decoder.expect_end("methodCall")?;

        Ok(RpcRequest {
            namespace: namespace.to_string(),
            method: method.to_string(),
            params,
        })
    }
}

fn write_value(out: &mut String, value: &Value) -> Result<()> {
    out.push_str("<value>");
    match value {
        Value::Nil => out.push_str("<nil/>"),
        Value::Bool(b) => {
            out.push_str(if *b { "<boolean>1</boolean>" } else { "<boolean>0</boolean>" })
        }
        Value::Int(i) => {
            let tag = value.type_name();
            out.push_str(&format!("<{tag}>{i}</{tag}>"));
        }
        Value::Double(d) => {
            if !d.is_finite() {
                return Err(SupervisorError::Encoding(format!(
                    "cannot encode non-finite double {}",
                    d
                )));
            }
            out.push_str(&format!("<double>{}</double>", d));
        }
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::DateTime(s) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</dateTime.iso8601>");
        }
        Value::Base64(bytes) => {
            out.push_str("<base64>");
            out.push_str(&base64::engine::general_purpose::STANDARD.encode(bytes));
            out.push_str("</base64>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item)?;
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                write_value(out, member)?;
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
    Ok(())
}

fn bare_scalar(text: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(text)
        .map_err(|_| SupervisorError::Encoding("response is not XML-RPC".to_string()))?;

    let value = match text {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => text.parse::<i64>().map(Value::Int).ok().or_else(|| {
            text.parse::<f64>()
                .ok()
                .filter(|d| d.is_finite())
                .map(Value::Double)
        }),
    };
    value.ok_or_else(|| SupervisorError::Encoding("response is not XML-RPC".to_string()))
}

/// Reads the members of a `<fault>` struct; extra members are tolerated.
fn fault_from_struct(value: &Value) -> Result<Fault> {
    let code = value.get(FAULT_CODE_KEY).and_then(Value::as_i64);
    let message = value.get(FAULT_STRING_KEY).and_then(Value::as_str);

    match (code, message) {
        (Some(code), Some(message)) => {
            let code = i32::try_from(code).map_err(|_| {
                SupervisorError::Encoding(format!("fault code {} out of range", code))
            })?;
            Ok(Fault::new(code, message))
        }
        _ => Err(SupervisorError::Encoding(
            "fault response lacks faultCode/faultString".to_string(),
        )),
    }
}

fn unexpected(expected: &str, found: &Event<'_>) -> SupervisorError {
    let found = match found {
        Event::Start(e) => format!("<{}>", tag_name(e)),
        Event::Empty(e) => format!("<{}/>", tag_name(e)),
        Event::End(e) => format!("</{}>", String::from_utf8_lossy(e.name().as_ref())),
        Event::Text(_) | Event::CData(_) => "text".to_string(),
        Event::Eof => "end of document".to_string(),
        _ => "markup".to_string(),
    };
    SupervisorError::Encoding(format!("expected {}, found {}", expected, found))
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

/// Pull parser over a complete XML-RPC document.
struct Decoder<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> Decoder<'a> {
    fn new(body: &'a [u8]) -> Self {
        Self {
            reader: Reader::from_reader(body),
        }
    }

    /// Next event that carries content; declarations and comments are skipped.
    fn next_raw(&mut self) -> Result<Event<'a>> {
        loop {
            match self.reader.read_event()? {
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => continue,
                event => return Ok(event),
            }
        }
    }

    /// Like [`next_raw`](Self::next_raw) but also skips whitespace between tags.
    fn next(&mut self) -> Result<Event<'a>> {
        loop {
            match self.next_raw()? {
                Event::Text(t) if is_blank(&t) => continue,
                event => return Ok(event),
            }
        }
    }

    fn expect_start(&mut self, name: &str) -> Result<()> {
        match self.next()? {
            Event::Start(e) if e.name().as_ref() == name.as_bytes() => Ok(()),
            other => Err(unexpected(&format!("<{}>", name), &other)),
        }
    }

    fn expect_end(&mut self, name: &str) -> Result<()> {
        match self.next()? {
            Event::End(e) if e.name().as_ref() == name.as_bytes() => Ok(()),
            other => Err(unexpected(&format!("</{}>", name), &other)),
        }
    }

    /// Collects character data up to the closing tag `name`.
    fn text_until(&mut self, name: &str) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.next_raw()? {
                Event::Text(t) => text.push_str(&unescape(&t)?),
                Event::CData(c) => text.push_str(&String::from_utf8(c.into_inner().into_owned())?),
                Event::End(e) if e.name().as_ref() == name.as_bytes() => return Ok(text),
                other => return Err(unexpected(&format!("</{}>", name), &other)),
            }
        }
    }

    /// Parses the contents of a `<value>` whose start tag was just consumed,
    /// including its end tag.
    fn value_body(&mut self) -> Result<Value> {
        let mut text = String::new();
        loop {
            match self.next_raw()? {
                Event::Text(t) => text.push_str(&unescape(&t)?),
                Event::CData(c) => text.push_str(&String::from_utf8(c.into_inner().into_owned())?),
                Event::Start(e) => {
                    let value = self.typed(&tag_name(&e))?;
                    self.expect_end("value")?;
                    return Ok(value);
                }
                Event::Empty(e) => {
                    let value = empty_typed(&tag_name(&e))?;
                    self.expect_end("value")?;
                    return Ok(value);
                }
                // Untyped values are strings.
                Event::End(e) if e.name().as_ref() == b"value" => return Ok(Value::String(text)),
                other => return Err(unexpected("a value", &other)),
            }
        }
    }

    fn typed(&mut self, name: &str) -> Result<Value> {
        match name {
            "int" | "i4" | "i8" | "ex:i8" => {
                let text = self.text_until(name)?;
                text.trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| SupervisorError::Encoding(format!("invalid integer '{}'", text)))
            }
            "boolean" => {
                let text = self.text_until(name)?;
                match text.trim() {
                    "1" | "true" => Ok(Value::Bool(true)),
                    "0" | "false" => Ok(Value::Bool(false)),
                    other => Err(SupervisorError::Encoding(format!("invalid boolean '{}'", other))),
                }
            }
            "double" => {
                let text = self.text_until(name)?;
                text.trim()
                    .parse::<f64>()
                    .map(Value::Double)
                    .map_err(|_| SupervisorError::Encoding(format!("invalid double '{}'", text)))
            }
            "string" => Ok(Value::String(self.text_until(name)?)),
            "dateTime.iso8601" => Ok(Value::DateTime(self.text_until(name)?.trim().to_string())),
            "base64" => {
                let text = self.text_until(name)?;
                let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                Ok(Value::Base64(
                    base64::engine::general_purpose::STANDARD.decode(compact)?,
                ))
            }
            "nil" | "ex:nil" => {
                self.expect_end(name)?;
                Ok(Value::Nil)
            }
            "array" => self.array(),
            "struct" => self.structure(),
            other => Err(SupervisorError::Encoding(format!("unknown value type <{}>", other))),
        }
    }

    fn array(&mut self) -> Result<Value> {
        let mut items = Vec::new();
        match self.next()? {
            Event::Start(e) if e.name().as_ref() == b"data" => loop {
                match self.next()? {
                    Event::Start(e) if e.name().as_ref() == b"value" => items.push(self.value_body()?),
                    Event::Empty(e) if e.name().as_ref() == b"value" => {
                        items.push(Value::String(String::new()))
                    }
                    Event::End(e) if e.name().as_ref() == b"data" => break,
                    other => return Err(unexpected("<value> or </data>", &other)),
                }
            },
            Event::Empty(e) if e.name().as_ref() == b"data" => {}
            other => return Err(unexpected("<data>", &other)),
        }
        self.expect_end("array")?;
        Ok(Value::Array(items))
    }

    fn structure(&mut self) -> Result<Value> {
        let mut members = BTreeMap::new();
        loop {
            match self.next()? {
                Event::Start(e) if e.name().as_ref() == b"member" => {
                    self.expect_start("name")?;
                    let name = self.text_until("name")?;
                    let value = match self.next()? {
                        Event::Start(e) if e.name().as_ref() == b"value" => self.value_body()?,
                        Event::Empty(e) if e.name().as_ref() == b"value" => Value::String(String::new()),
                        other => return Err(unexpected("<value>", &other)),
                    };
                    self.expect_end("member")?;
                    members.insert(name, value);
                }
                Event::End(e) if e.name().as_ref() == b"struct" => break,
                other => return Err(unexpected("<member> or </struct>", &other)),
            }
        }
        Ok(Value::Struct(members))
    }
}

fn empty_typed(name: &str) -> Result<Value> {
    match name {
        "nil" | "ex:nil" => Ok(Value::Nil),
        "string" => Ok(Value::String(String::new())),
        "base64" => Ok(Value::Base64(Vec::new())),
        "array" => Ok(Value::Array(Vec::new())),
        "struct" => Ok(Value::Struct(BTreeMap::new())),
        other => Err(SupervisorError::Encoding(format!("empty <{}/> has no value", other))),
    }
}

fn unescape<'t>(text: &'t quick_xml::events::BytesText<'_>) -> Result<Cow<'t, str>> {
    text.unescape()
        .map_err(|e| SupervisorError::Encoding(format!("invalid character data: {}", e)))
}
