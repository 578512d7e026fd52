pub mod classify_invoices;
pub mod render_invoices_xml;
