use chrono::NaiveDate;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;
use std::io::Cursor;

use crate::core::InvoiceError;
use crate::tax::round_amount;

pub type XmlResult = Result<String, InvoiceError>;

fn xml_io(e: std::io::Error) -> InvoiceError {
    InvoiceError::Xml(format!("write error: {e}"))
}

/// Indenting element writer over an in-memory buffer.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, InvoiceError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    pub fn into_string(self) -> Result<String, InvoiceError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| InvoiceError::Xml(format!("UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, InvoiceError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, InvoiceError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer.write_event(Event::Start(elem)).map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, InvoiceError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, InvoiceError> {
        self.text_element_with_attrs(name, text, &[])
    }

    pub fn text_element_with_attrs(
        &mut self,
        name: &str,
        text: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, InvoiceError> {
        self.start_element_with_attrs(name, attrs)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    /// Write a monetary amount, rounded to the cent.
    pub fn amount_element(&mut self, name: &str, amount: Decimal) -> Result<&mut Self, InvoiceError> {
        self.text_element(name, &format_amount(amount))
    }

    /// Write a quantity with unitCode attribute.
    pub fn quantity_element(
        &mut self,
        name: &str,
        qty: Decimal,
        unit: &str,
    ) -> Result<&mut Self, InvoiceError> {
        self.text_element_with_attrs(name, &format_decimal(qty), &[("unitCode", unit)])
    }

    /// Write `<name><udt:DateTimeString format="102">YYYYMMDD</…></name>`.
    pub fn date_element(&mut self, name: &str, date: NaiveDate) -> Result<&mut Self, InvoiceError> {
        self.start_element(name)?;
        self.text_element_with_attrs(
            "udt:DateTimeString",
            &date.format("%Y%m%d").to_string(),
            &[("format", "102")],
        )?;
        self.end_element(name)
    }

    /// Write `<name><udt:DateString format="102">YYYYMMDD</…></name>`.
    pub fn date_string_element(
        &mut self,
        name: &str,
        date: NaiveDate,
    ) -> Result<&mut Self, InvoiceError> {
        self.start_element(name)?;
        self.text_element_with_attrs(
            "udt:DateString",
            &date.format("%Y%m%d").to_string(),
            &[("format", "102")],
        )?;
        self.end_element(name)
    }
}

/// Format a monetary amount with exactly 2 decimal places.
pub fn format_amount(d: Decimal) -> String {
    let rounded = round_amount(d);
    if rounded.is_zero() {
        "0.00".to_string()
    } else {
        rounded.to_string()
    }
}

/// Format a Decimal for XML output with at least 2 decimal places, dropping
/// trailing zeros beyond that.
pub fn format_decimal(d: Decimal) -> String {
    let s = d.normalize().to_string();
    match s.find('.') {
        Some(dot) => {
            let decimals = s.len() - dot - 1;
            if decimals < 2 {
                format!("{s}{}", "0".repeat(2 - decimals))
            } else {
                s
            }
        }
        None => format!("{s}.00"),
    }
}
