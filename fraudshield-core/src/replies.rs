//! Reply association — correlating customer confirmations to contacts.

use crate::record::ReplyRecord;
use std::collections::BTreeMap;

/// The most recent reply per contact, later appends winning.
///
/// Records without a contact are ignored; append order is the tiebreaker
/// since legacy timestamps are not reliably sortable.
pub fn latest_reply_per_contact(records: &[ReplyRecord]) -> BTreeMap<String, ReplyRecord> {
    let mut latest = BTreeMap::new();
    for record in records {
        if let Some(contact) = &record.contact {
            latest.insert(contact.clone(), record.clone());
        }
    }
    latest
}
