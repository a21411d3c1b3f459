//! Assembly - turning a cached template into one instance's content.
//!
//! Runs once per instance, when its template becomes available:
//!
//! 1. Deep-copy the template (the cached fragment is shared and never mutated)
//! 2. Project the host's children into `<slot>` placeholders of the copy
//! 3. Clear the instance root
//! 4. Re-create every embedded `<style>`/`<script>` with rewritten text
//! 5. Move the copy's children into the root
//! 6. Hand each script to the [`ScriptHost`](super::ScriptHost)
//! 7. Attach nested components found in the new content
//! 8. Seed props from prefixed host attributes
//! 9. Mark ready and emit `ready:<kind>`

use std::collections::HashMap;

use super::Runtime;
use super::registry::{InstanceRecord, Lifecycle};
use super::scoping::{ScopeRules, scope_styles};
use super::script::bind_script;
use crate::config::Config;
use crate::dom::Document;
use crate::types::{EventPayload, InstanceId, Value};

/// Tag of slot placeholders in templates.
pub const SLOT_TAG: &str = "slot";

impl<D: Document + 'static> Runtime<D> {
    pub(crate) fn assemble(&self, id: &InstanceId, template: &D::Node) {
        let Some(record) = self.inner.instances.borrow().record(id).cloned() else {
            return;
        };
        let config = self.config();
        tracing::debug!(instance = %id, kind = %record.kind, "component.assembling");

        let scripts = {
            let mut doc = self.document_mut();
            build_content(&mut *doc, &record, template, &config)
        };
        self.set_lifecycle(id, Lifecycle::Assembled);

        // Scripts may call back into the runtime, so nothing is borrowed here
        let host = self.script_host();
        for source in &scripts {
            host.execute(self, id, source);
        }
        if self.lifecycle(id).is_none() {
            tracing::debug!(instance = %id, "component.detached_during_assembly");
            return;
        }

        self.upgrade(&record.root);

        let prefix = config.prop_prefix.as_str();
        let initial: Vec<(String, String)> = self
            .document()
            .attributes(&record.host)
            .into_iter()
            .filter_map(|(name, value)| {
                let prop = name.strip_prefix(prefix)?;
                (!prefix.is_empty() && !prop.is_empty()).then(|| (prop.to_string(), value))
            })
            .collect();
        for (name, value) in initial {
            self.set_prop(id, &name, Value::Text(value));
        }

        self.set_lifecycle(id, Lifecycle::Ready);
        tracing::debug!(instance = %id, kind = %record.kind, scripts = scripts.len(), "component.ready");
        self.emit(&format!("ready:{}", record.kind), EventPayload::Instance(id.clone()));
    }
}

/// Steps 1 to 5. Returns the rewritten script sources in document order.
fn build_content<D: Document>(
    doc: &mut D,
    record: &InstanceRecord<D::Node>,
    template: &D::Node,
    config: &Config,
) -> Vec<String> {
    let copy = doc.deep_clone(template);

    let projected = project_slots(doc, &record.host, &copy, &config.slot_attribute);

    // Replaced fallback content is gone from the copy; projected content is left alone
    let embedded: Vec<D::Node> = doc
        .descendants(&copy)
        .into_iter()
        .filter(|node| matches!(doc.tag_name(node).as_deref(), Some("style" | "script")))
        .filter(|node| !projected.iter().any(|child| is_within(&*doc, node, child)))
        .collect();

    doc.remove_children(&record.root);

    let mut scripts = Vec::new();
    for element in embedded {
        let Some(tag) = doc.tag_name(&element) else {
            continue;
        };
        let source = doc.text_content(&element);
        let text = if tag == "style" {
            if record.rules.contains(ScopeRules::STYLES) {
                scope_styles(&source, &record.kind, &config.ref_attribute)
            } else {
                source
            }
        } else if record.rules.contains(ScopeRules::SCRIPTS) {
            bind_script(&source, &record.id)
        } else {
            source
        };

        let fresh = doc.create_element(&tag);
        for (name, value) in doc.attributes(&element) {
            doc.set_attribute(&fresh, &name, &value);
        }
        doc.set_text_content(&fresh, &text);
        doc.replace_node(&element, &fresh);

        if tag == "script" {
            scripts.push(text);
        }
    }

    doc.append_child(&record.root, &copy);
    scripts
}

/// Move host children into matching `<slot>` placeholders of `copy`.
///
/// Element children are keyed by their slot attribute (default `""`),
/// non-blank text children by `""`. The first child per name wins.
/// Placeholders with nothing to project are left in place.
///
/// Returns the children that were moved.
fn project_slots<D: Document>(
    doc: &mut D,
    host: &D::Node,
    copy: &D::Node,
    slot_attribute: &str,
) -> Vec<D::Node> {
    let mut slotted: HashMap<String, D::Node> = HashMap::new();
    for child in doc.children(host) {
        let name = if doc.is_text(&child) {
            if doc.text_content(&child).trim().is_empty() {
                continue;
            }
            String::new()
        } else if doc.tag_name(&child).is_some() {
            doc.attribute(&child, slot_attribute).unwrap_or_default()
        } else {
            continue;
        };
        slotted.entry(name).or_insert(child);
    }

    let mut projected = Vec::new();
    if slotted.is_empty() {
        return projected;
    }

    for placeholder in doc.elements_by_tag(copy, SLOT_TAG) {
        // Nested in the fallback of a slot that was already filled
        if !is_within(doc, &placeholder, copy) {
            continue;
        }
        let name = doc.attribute(&placeholder, "name").unwrap_or_default();
        if let Some(child) = slotted.remove(&name) {
            doc.replace_node(&placeholder, &child);
            projected.push(child);
        }
    }
    projected
}

/// Is `node` `ancestor` itself or one of its descendants?
fn is_within<D: Document>(doc: &D, node: &D::Node, ancestor: &D::Node) -> bool {
    let mut current = Some(node.clone());
    while let Some(next) = current {
        if next == *ancestor {
            return true;
        }
        current = doc.parent(&next);
    }
    false
}
