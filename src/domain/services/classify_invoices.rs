use crate::domain::entities::invoice::{InvoiceKind, InvoicePayload};

/// Designates the "primary entity" of an export run: the counterparty name
/// occurring most often across all seller and buyer fields.
///
/// Empty names (the default for malformed payloads) are not counted, so a
/// store dominated by malformed records does not elect `""` and label every
/// broken invoice a sale. Ties break on first-encountered order: counting
/// is insertion-ordered and only a strictly greater frequency wins.
pub fn primary_entity(payloads: &[InvoicePayload]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();

    for payload in payloads {
        for name in [&payload.sprzedawca.nazwa, &payload.nabywca.nazwa] {
            if name.is_empty() {
                continue;
            }
            match counts.iter_mut().find(|(counted, _)| counted == name) {
                Some((_, count)) => *count += 1,
                None => counts.push((name, 1)),
            }
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (name, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((name, count));
        }
    }

    best.map(|(name, _)| name.to_owned())
}

/// Labels one invoice relative to the primary entity: the primary selling
/// is a sale, the primary buying is a purchase, anything else is unknown.
pub fn classify(payload: &InvoicePayload, primary: Option<&str>) -> InvoiceKind {
    match primary {
        Some(primary) if payload.sprzedawca.nazwa == primary => InvoiceKind::Sale,
        Some(primary) if payload.nabywca.nazwa == primary => InvoiceKind::Purchase,
        _ => InvoiceKind::Unclassified,
    }
}
