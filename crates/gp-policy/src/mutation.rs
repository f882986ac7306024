// mutation.rs — Writing a target state into a registry backend.
//
// `apply` is the inverse of inference: for a target state it writes exactly
// the values inference looks for.
//
// - Enabled: purging list keys come first, so a list sharing the policy key
//   cannot wipe what follows. Then the main on value (DWORD 1 when not
//   declared), the on list, and one write per element that has an option
//   value. Deletion markers left behind by an earlier Disabled are dropped
//   for elements without one.
// - Disabled: the main off value (a deletion when not declared), the off
//   list; list keys are cleared and every other element value deleted.
// - NotConfigured: everything the policy could have written is forgotten,
//   markers included, so nothing is left for inference to find.
//
// Options are validated before the first write; a rejected call leaves the
// backend untouched.

use gp_admx::{AdmxPolicy, EnumElement, PolicyElement, RegistryValue, ValueList};
use gp_registry::{RegistryError, RegistryStore, TypedValue};
use tracing::debug;

use crate::error::MutationError;
use crate::inference::{boolean_off_value, boolean_on_value};
use crate::options::{OptionValue, OptionValues};
use crate::state::TargetState;

/// Apply `target` for `policy` to `sink`.
pub fn apply(
    policy: &AdmxPolicy,
    target: TargetState,
    options: &OptionValues,
    sink: &mut dyn RegistryStore,
) -> Result<(), MutationError> {
    validate(policy, target, options)?;
    match target {
        TargetState::Enabled => enable(policy, options, sink)?,
        TargetState::Disabled => disable(policy, sink)?,
        TargetState::NotConfigured => clear(policy, sink)?,
    }
    debug!(policy = %policy.id, ?target, options = options.len(), "applied policy state");
    Ok(())
}

/// Check `options` against the policy's elements without writing anything.
pub fn validate(
    policy: &AdmxPolicy,
    target: TargetState,
    options: &OptionValues,
) -> Result<(), MutationError> {
    for id in options.keys() {
        if policy.element(id).is_none() {
            return Err(MutationError::UnknownElement {
                element: id.clone(),
            });
        }
    }
    if target != TargetState::Enabled {
        return Ok(());
    }
    for element in &policy.elements {
        match options.get(element.id()) {
            Some(value) => check_option(policy, element, value)?,
            None if is_required(element) => {
                return Err(MutationError::MissingOption {
                    element: element.id().to_string(),
                })
            }
            None => {}
        }
    }
    Ok(())
}

fn is_required(element: &PolicyElement) -> bool {
    match element {
        PolicyElement::Decimal(e) => e.required,
        PolicyElement::Text(e) => e.required,
        PolicyElement::Enum(e) => e.required,
        _ => false,
    }
}

fn check_option(
    policy: &AdmxPolicy,
    element: &PolicyElement,
    value: &OptionValue,
) -> Result<(), MutationError> {
    let invalid = |reason: String| MutationError::InvalidOption {
        element: element.id().to_string(),
        reason,
    };
    match (element, value) {
        (PolicyElement::Decimal(d), OptionValue::Decimal(n)) => {
            if *n < d.minimum || *n > d.maximum {
                return Err(invalid(format!(
                    "{n} is outside [{}, {}]",
                    d.minimum, d.maximum
                )));
            }
        }
        (PolicyElement::Text(t), OptionValue::Text(s)) => {
            let len = s.chars().count();
            if len > t.max_length as usize {
                return Err(invalid(format!(
                    "{len} characters exceeds the maximum of {}",
                    t.max_length
                )));
            }
        }
        (PolicyElement::Enum(e), OptionValue::Enum(i)) => {
            if *i >= e.items.len() {
                return Err(invalid(format!(
                    "item {i} out of range ({} items)",
                    e.items.len()
                )));
            }
        }
        (PolicyElement::List(l), OptionValue::List(_)) if !l.user_provides_names => {}
        (PolicyElement::List(l), OptionValue::Dictionary(_)) if l.user_provides_names => {}
        (PolicyElement::Boolean(_), OptionValue::Boolean(_))
        | (PolicyElement::MultiText(_), OptionValue::MultiText(_)) => {}
        _ => {
            return Err(invalid(format!(
                "expected a {} value, got {}",
                element.kind_name(),
                value.kind_name()
            )))
        }
    }

    let needs_name = !matches!(element, PolicyElement::List(_) | PolicyElement::Boolean(_));
    if needs_name && element.value_name(policy).is_none() {
        return Err(MutationError::NoValueName {
            element: element.id().to_string(),
        });
    }
    Ok(())
}

fn write_value(
    sink: &mut dyn RegistryStore,
    key: &str,
    name: &str,
    value: &RegistryValue,
) -> Result<(), RegistryError> {
    match value {
        RegistryValue::Delete => sink.delete(key, name),
        RegistryValue::Numeric(n) => sink.set(key, name, TypedValue::U32(*n)),
        RegistryValue::Text(s) => sink.set(key, name, TypedValue::String(s.clone())),
    }
}

/// Like `write_value`, but deletions leave no marker.
fn write_value_quietly(
    sink: &mut dyn RegistryStore,
    key: &str,
    name: &str,
    value: &RegistryValue,
) -> Result<(), RegistryError> {
    match value {
        RegistryValue::Delete => sink.forget_value(key, name),
        other => write_value(sink, key, name, other),
    }
}

fn write_list(
    sink: &mut dyn RegistryStore,
    list: &ValueList,
    fallback_key: &str,
    quiet: bool,
) -> Result<(), RegistryError> {
    for entry in &list.entries {
        let Some(value) = &entry.value else { continue };
        let key = list.entry_key(entry, fallback_key);
        if quiet {
            write_value_quietly(sink, key, &entry.value_name, value)?;
        } else {
            write_value(sink, key, &entry.value_name, value)?;
        }
    }
    Ok(())
}

fn forget_list(
    sink: &mut dyn RegistryStore,
    list: Option<&ValueList>,
    fallback_key: &str,
) -> Result<(), RegistryError> {
    let Some(list) = list else { return Ok(()) };
    for entry in &list.entries {
        sink.forget_value(list.entry_key(entry, fallback_key), &entry.value_name)?;
    }
    Ok(())
}

fn forget_enum_lists(
    sink: &mut dyn RegistryStore,
    element: &EnumElement,
    key: &str,
    except: Option<usize>,
) -> Result<(), RegistryError> {
    for (i, item) in element.items.iter().enumerate() {
        if Some(i) != except {
            forget_list(sink, item.value_list.as_ref(), key)?;
        }
    }
    Ok(())
}

fn no_value_name(element: &PolicyElement) -> MutationError {
    MutationError::NoValueName {
        element: element.id().to_string(),
    }
}

/// Drop the deletion markers in `list` without writing anything.
fn unmark_list(
    sink: &mut dyn RegistryStore,
    list: Option<&ValueList>,
    fallback_key: &str,
) -> Result<(), RegistryError> {
    let Some(list) = list else { return Ok(()) };
    for entry in &list.entries {
        sink.forget_marker(list.entry_key(entry, fallback_key), &entry.value_name)?;
    }
    Ok(())
}

/// Clear the markers of an element that gets no value in this apply.
fn unmark_element(
    policy: &AdmxPolicy,
    element: &PolicyElement,
    sink: &mut dyn RegistryStore,
) -> Result<(), RegistryError> {
    let key = element.registry_key(policy);
    match element {
        PolicyElement::List(_) => return sink.forget_key_marker(key),
        PolicyElement::Boolean(b) => {
            unmark_list(sink, b.affected.on_list.as_ref(), key)?;
            unmark_list(sink, b.affected.off_list.as_ref(), key)?;
        }
        PolicyElement::Enum(e) => {
            for item in &e.items {
                unmark_list(sink, item.value_list.as_ref(), key)?;
            }
        }
        _ => {}
    }
    match element.value_name(policy) {
        Some(name) => sink.forget_marker(key, name),
        None => Ok(()),
    }
}

/// Purge the keys of purging lists that have a value in this apply. An
/// empty purge leaves no marker, which would read as a cleared list.
fn purge_lists(
    policy: &AdmxPolicy,
    options: &OptionValues,
    sink: &mut dyn RegistryStore,
) -> Result<(), RegistryError> {
    for element in &policy.elements {
        let PolicyElement::List(list) = element else { continue };
        if !list.purge_others {
            continue;
        }
        let key = element.registry_key(policy);
        match options.get(element.id()) {
            Some(OptionValue::List(items)) if items.is_empty() => sink.forget_key(key)?,
            Some(OptionValue::Dictionary(map)) if map.is_empty() => sink.forget_key(key)?,
            Some(_) => sink.clear_key(key)?,
            None => {}
        }
    }
    Ok(())
}

fn enable(
    policy: &AdmxPolicy,
    options: &OptionValues,
    sink: &mut dyn RegistryStore,
) -> Result<(), MutationError> {
    purge_lists(policy, options, sink)?;

    let key = policy.key.as_str();
    let affected = &policy.affected;
    if let Some(name) = policy.value_name.as_deref() {
        let on = affected.on_value.clone().unwrap_or(RegistryValue::Numeric(1));
        write_value(sink, key, name, &on)?;
    }
    forget_list(sink, affected.off_list.as_ref(), key)?;
    if let Some(list) = &affected.on_list {
        write_list(sink, list, key, false)?;
    }

    for element in &policy.elements {
        match options.get(element.id()) {
            Some(value) => write_element(policy, element, value, sink)?,
            None => unmark_element(policy, element, sink)?,
        }
    }
    Ok(())
}

fn write_element(
    policy: &AdmxPolicy,
    element: &PolicyElement,
    value: &OptionValue,
    sink: &mut dyn RegistryStore,
) -> Result<(), MutationError> {
    let key = element.registry_key(policy);
    let name = element.value_name(policy);
    match (element, value) {
        (PolicyElement::Decimal(d), OptionValue::Decimal(n)) => {
            let name = name.ok_or_else(|| no_value_name(element))?;
            if d.no_overwrite && sink.contains(key, name) {
                return Ok(());
            }
            let data = if d.store_as_text {
                TypedValue::String(n.to_string())
            } else {
                TypedValue::U32(*n)
            };
            sink.set(key, name, data)?;
        }
        (PolicyElement::Boolean(b), OptionValue::Boolean(checked)) => {
            let affected = &b.affected;
            if *checked {
                forget_list(sink, affected.off_list.as_ref(), key)?;
                if let (Some(v), Some(name)) = (boolean_on_value(b), name) {
                    write_value(sink, key, name, &v)?;
                }
                if let Some(list) = &affected.on_list {
                    write_list(sink, list, key, false)?;
                }
            } else {
                forget_list(sink, affected.on_list.as_ref(), key)?;
                if let (Some(v), Some(name)) = (boolean_off_value(b), name) {
                    write_value_quietly(sink, key, name, &v)?;
                }
                if let Some(list) = &affected.off_list {
                    write_list(sink, list, key, true)?;
                }
            }
        }
        (PolicyElement::Text(t), OptionValue::Text(s)) => {
            let name = name.ok_or_else(|| no_value_name(element))?;
            if t.no_overwrite && sink.contains(key, name) {
                return Ok(());
            }
            let data = if t.expandable {
                TypedValue::ExpandString(s.clone())
            } else {
                TypedValue::String(s.clone())
            };
            sink.set(key, name, data)?;
        }
        (PolicyElement::List(l), OptionValue::List(_) | OptionValue::Dictionary(_)) => {
            let wrap = |s: &str| {
                if l.expandable {
                    TypedValue::ExpandString(s.to_string())
                } else {
                    TypedValue::String(s.to_string())
                }
            };
            // Purging lists were cleared up front; additive ones only lose
            // the marker an earlier Disabled left.
            if !l.purge_others {
                sink.forget_key_marker(key)?;
            }
            match value {
                OptionValue::Dictionary(map) => {
                    for (n, v) in map {
                        sink.set(key, n, wrap(v))?;
                    }
                }
                OptionValue::List(items) => {
                    let prefix = l.value_prefix.as_deref().filter(|_| l.has_prefix());
                    for (i, item) in items.iter().enumerate() {
                        let value_name = match prefix {
                            Some(p) => format!("{p}{}", i + 1),
                            None => item.clone(),
                        };
                        sink.set(key, &value_name, wrap(item))?;
                    }
                }
                _ => {}
            }
        }
        (PolicyElement::Enum(e), OptionValue::Enum(index)) => {
            let Some(item) = e.items.get(*index) else {
                return Err(MutationError::InvalidOption {
                    element: e.id.clone(),
                    reason: format!("item {index} out of range"),
                });
            };
            forget_enum_lists(sink, e, key, Some(*index))?;
            if let Some(v) = &item.value {
                let name = name.ok_or_else(|| no_value_name(element))?;
                write_value(sink, key, name, v)?;
            }
            if let Some(list) = &item.value_list {
                write_list(sink, list, key, false)?;
            }
        }
        (PolicyElement::MultiText(_), OptionValue::MultiText(items)) => {
            let name = name.ok_or_else(|| no_value_name(element))?;
            sink.set(key, name, TypedValue::MultiString(items.clone()))?;
        }
        _ => {
            return Err(MutationError::InvalidOption {
                element: element.id().to_string(),
                reason: format!(
                    "expected a {} value, got {}",
                    element.kind_name(),
                    value.kind_name()
                ),
            })
        }
    }
    Ok(())
}

fn disable(policy: &AdmxPolicy, sink: &mut dyn RegistryStore) -> Result<(), MutationError> {
    for element in &policy.elements {
        if let PolicyElement::List(_) = element {
            sink.clear_key(element.registry_key(policy))?;
        }
    }

    let key = policy.key.as_str();
    let affected = &policy.affected;
    if let Some(name) = policy.value_name.as_deref() {
        match &affected.off_value {
            Some(v) => write_value(sink, key, name, v)?,
            None => sink.delete(key, name)?,
        }
    }
    forget_list(sink, affected.on_list.as_ref(), key)?;
    if let Some(list) = &affected.off_list {
        write_list(sink, list, key, false)?;
    }

    for element in &policy.elements {
        let key = element.registry_key(policy);
        let name = element.value_name(policy);
        match element {
            PolicyElement::List(_) => {}
            PolicyElement::Boolean(b) => {
                let affected = &b.affected;
                if affected.off_value.is_some() || affected.off_list.is_some() {
                    forget_list(sink, affected.on_list.as_ref(), key)?;
                    if let (Some(v), Some(name)) = (&affected.off_value, name) {
                        write_value(sink, key, name, v)?;
                    }
                    if let Some(list) = &affected.off_list {
                        write_list(sink, list, key, false)?;
                    }
                } else if let Some(name) = name {
                    sink.delete(key, name)?;
                }
            }
            PolicyElement::Enum(e) => {
                forget_enum_lists(sink, e, key, None)?;
                if let Some(name) = name {
                    sink.delete(key, name)?;
                }
            }
            _ => {
                if let Some(name) = name {
                    sink.delete(key, name)?;
                }
            }
        }
    }
    Ok(())
}

fn clear(policy: &AdmxPolicy, sink: &mut dyn RegistryStore) -> Result<(), MutationError> {
    let key = policy.key.as_str();
    if let Some(name) = policy.value_name.as_deref() {
        sink.forget_value(key, name)?;
    }
    forget_list(sink, policy.affected.on_list.as_ref(), key)?;
    forget_list(sink, policy.affected.off_list.as_ref(), key)?;

    for element in &policy.elements {
        let key = element.registry_key(policy);
        let name = element.value_name(policy);
        match element {
            PolicyElement::List(_) => {
                sink.forget_key(key)?;
                continue;
            }
            PolicyElement::Boolean(b) => {
                forget_list(sink, b.affected.on_list.as_ref(), key)?;
                forget_list(sink, b.affected.off_list.as_ref(), key)?;
            }
            PolicyElement::Enum(e) => forget_enum_lists(sink, e, key, None)?,
            _ => {}
        }
        if let Some(name) = name {
            sink.forget_value(key, name)?;
        }
    }
    Ok(())
}
