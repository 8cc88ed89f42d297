//! Birth-parent detection over a child's RelatedPerson resources.

use serde_json::Value;

use crate::extract::{array_field, str_field};
use crate::matcher::coding_has;

const ROLE_CODE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v3-RoleCode";
const CERNER_RELATIONSHIP_SYSTEM: &str =
    "https://fhir.cerner.com/ec2458f2-1e24-41c8-b71b-0e701af7583d/codeSet/40";

fn is_mother_coding(coding: &Value) -> bool {
    coding_has(coding, ROLE_CODE_SYSTEM, "MTH") || coding_has(coding, CERNER_RELATIONSHIP_SYSTEM, "156")
}

/// Whether the RelatedPerson is recorded as the child's mother.
///
/// Checks codings on each relationship's extensions, plus the
/// relationship's own codings.
pub fn is_birth_parent(related_person: &Value) -> bool {
    array_field(related_person, "relationship")
        .iter()
        .any(|relationship| {
            let on_extension = array_field(relationship, "extension").iter().any(|extension| {
                extension
                    .get("valueCodeableConcept")
                    .map(|concept| array_field(concept, "coding").iter().any(is_mother_coding))
                    .unwrap_or(false)
            });
            on_extension || array_field(relationship, "coding").iter().any(is_mother_coding)
        })
}

pub fn find_birth_parent(related_persons: &[Value]) -> Option<&Value> {
    related_persons.iter().find(|person| is_birth_parent(person))
}

/// First identifier carrying both a system and a value, as `(system, value)`.
pub fn birth_parent_identifier(related_person: &Value) -> Option<(&str, &str)> {
    array_field(related_person, "identifier")
        .iter()
        .find_map(|identifier| Some((str_field(identifier, "system")?, str_field(identifier, "value")?)))
}
