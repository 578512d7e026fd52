use quick_xml::{
    events::{BytesDecl, BytesText, Event},
    Writer,
};

use crate::domain::entities::invoice::{InvoiceKind, InvoicePayload};

/// One classified record of an export run.
#[derive(Debug)]
pub struct ExportInvoice {
    pub id: i64,
    pub kind: InvoiceKind,
    pub payload: InvoicePayload,
}

/// Renders the export document:
///
/// ```xml
/// <Faktury>
///   <Faktura id=".." typ="sprzedaz|zakup|nieznany">
///     <Numer>..</Numer><Sprzedawca>..</Sprzedawca><Nabywca>..</Nabywca>
///     <Netto>..</Netto><VAT>..</VAT><Brutto>..</Brutto>
///   </Faktura>
/// </Faktury>
/// ```
///
/// Text and attribute content goes through the writer's entity escaping,
/// so counterparty names containing `&`, `<`, `>`, `"` or `'` stay
/// well-formed.
pub fn render_invoices_xml(invoices: &[ExportInvoice]) -> Result<String, quick_xml::Error> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer
        .create_element("Faktury")
        .write_inner_content(|writer| {
            for invoice in invoices {
                writer
                    .create_element("Faktura")
                    .with_attribute(("id", invoice.id.to_string().as_str()))
                    .with_attribute(("typ", invoice.kind.as_export_label()))
                    .write_inner_content(|writer| {
                        let payload = &invoice.payload;
                        write_text_element(writer, "Numer", &payload.numer_faktury)?;
                        write_text_element(writer, "Sprzedawca", &payload.sprzedawca.nazwa)?;
                        write_text_element(writer, "Nabywca", &payload.nabywca.nazwa)?;
                        write_text_element(writer, "Netto", &payload.suma_netto.to_string())?;
                        write_text_element(writer, "VAT", &payload.suma_vat.to_string())?;
                        write_text_element(writer, "Brutto", &payload.suma_brutto.to_string())?;
                        Ok(())
                    })?;
            }
            Ok(())
        })?;

    let document = writer.into_inner();
    String::from_utf8(document).map_err(|error| quick_xml::Error::from(error.utf8_error()))
}

fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: &str,
) -> Result<(), quick_xml::Error> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(value))?;
    Ok(())
}
