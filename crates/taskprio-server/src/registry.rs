//! Rule registry - owns rule, template and group definitions.
//!
//! Plain synchronous data; [`AppState`](crate::state::AppState) wraps it in a
//! read/write lock so evaluations (readers) never see a half-applied update.

use std::collections::HashMap;

use tracing::{info, warn};

use taskprio_core::{
    validate_definition, CoreError, GroupFilter, GroupId, GroupPatch, GroupSpec, Instantiation,
    Page, Pagination, PriorityBounds, PriorityRule, RuleFilter, RuleGroup, RuleId, RulePatch,
    RuleSpec, RuleTemplate, RuleWarning, TemplateFilter, TemplateId, TemplateSpec,
};

/// A rule together with the non-fatal findings from validating it.
#[derive(Debug, Clone)]
pub struct Validated<T> {
    pub item: T,
    pub warnings: Vec<RuleWarning>,
}

/// Rule, template and group definitions.
pub struct RuleRegistry {
    rules: HashMap<RuleId, PriorityRule>,
    /// Rule ids in creation order.
    rule_order: Vec<RuleId>,
    templates: HashMap<TemplateId, RuleTemplate>,
    groups: HashMap<GroupId, RuleGroup>,
    bounds: PriorityBounds,
}

fn check_version(
    entity: &'static str,
    id: &str,
    expected: Option<u64>,
    actual: u64,
) -> Result<(), CoreError> {
    match expected {
        Some(expected) if expected != actual => Err(CoreError::ConcurrentModification {
            entity,
            id: id.to_string(),
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

fn log_warnings(rule_name: &str, warnings: &[RuleWarning]) {
    for warning in warnings {
        warn!(rule = %rule_name, warning = %warning, "Rule definition warning");
    }
}

impl RuleRegistry {
    pub fn new(bounds: PriorityBounds) -> Self {
        Self {
            rules: HashMap::new(),
            rule_order: Vec::new(),
            templates: HashMap::new(),
            groups: HashMap::new(),
            bounds,
        }
    }

    // ------------------------------------------------------------------
    // Rules
    // ------------------------------------------------------------------

    pub fn create_rule(&mut self, spec: RuleSpec) -> Result<Validated<PriorityRule>, CoreError> {
        let warnings =
            validate_definition(&spec.name, &spec.conditions, &spec.actions, &self.bounds)?;
        let rule = PriorityRule::from_spec(spec);
        log_warnings(&rule.name, &warnings);

        info!(rule_id = %rule.id, name = %rule.name, enabled = rule.enabled, "Rule created");
        self.rule_order.push(rule.id.clone());
        self.rules.insert(rule.id.clone(), rule.clone());
        Ok(Validated {
            item: rule,
            warnings,
        })
    }

    pub fn get_rule(&self, id: &RuleId) -> Result<&PriorityRule, CoreError> {
        self.rules
            .get(id)
            .ok_or_else(|| CoreError::RuleNotFound(id.to_string()))
    }

    pub fn update_rule(
        &mut self,
        id: &RuleId,
        patch: RulePatch,
    ) -> Result<Validated<PriorityRule>, CoreError> {
        let current = self.get_rule(id)?;
        check_version("rule", id.as_str(), patch.expected_version, current.version)?;

        let mut updated = current.clone();
        updated.apply_patch(patch);
        let warnings = validate_definition(
            &updated.name,
            &updated.conditions,
            &updated.actions,
            &self.bounds,
        )?;
        log_warnings(&updated.name, &warnings);

        info!(rule_id = %id, version = updated.version, "Rule updated");
        self.rules.insert(id.clone(), updated.clone());
        Ok(Validated {
            item: updated,
            warnings,
        })
    }

    /// Delete a rule and drop it from every group that references it.
    pub fn delete_rule(&mut self, id: &RuleId) -> Result<PriorityRule, CoreError> {
        let rule = self
            .rules
            .remove(id)
            .ok_or_else(|| CoreError::RuleNotFound(id.to_string()))?;
        self.rule_order.retain(|other| other != id);

        for group in self.groups.values_mut() {
            if group.remove_rule(id) {
                group.touch();
                info!(rule_id = %id, group_id = %group.id, "Removed deleted rule from group");
            }
        }

        info!(rule_id = %id, "Rule deleted");
        Ok(rule)
    }

    /// Rules in evaluation order, which is creation order.
    fn ordered_rules(&self) -> Vec<&PriorityRule> {
        self.rule_order
            .iter()
            .filter_map(|id| self.rules.get(id))
            .collect()
    }

    pub fn list_rules(
        &self,
        filter: &RuleFilter,
        pagination: &Pagination,
        default_size: usize,
        max_size: usize,
    ) -> Page<PriorityRule> {
        let rules: Vec<PriorityRule> = self
            .ordered_rules()
            .into_iter()
            .filter(|rule| filter.matches(rule))
            .cloned()
            .collect();
        pagination.paginate(rules, default_size, max_size)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> impl Iterator<Item = &PriorityRule> {
        self.rules.values()
    }

    /// Rules that take part in evaluation, in evaluation order.
    ///
    /// A disabled rule never takes part. An enabled rule that belongs to no
    /// group is active on its own; an enabled rule that belongs to groups is
    /// active only while at least one of them is enabled.
    pub fn active_rules(&self) -> Vec<&PriorityRule> {
        self.ordered_rules()
            .into_iter()
            .filter(|rule| rule.enabled && self.owning_context_active(&rule.id))
            .collect()
    }

    /// Identity of the active rule set: which rules, at which versions.
    ///
    /// Two registries with equal fingerprints evaluate every task the same way.
    pub fn active_fingerprint(&self) -> Vec<(RuleId, u64)> {
        self.active_rules()
            .into_iter()
            .map(|rule| (rule.id.clone(), rule.version))
            .collect()
    }

    fn owning_context_active(&self, rule_id: &RuleId) -> bool {
        let mut grouped = false;
        for group in self.groups.values() {
            if group.contains(rule_id) {
                if group.enabled {
                    return true;
                }
                grouped = true;
            }
        }
        !grouped
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    pub fn create_template(&mut self, spec: TemplateSpec) -> Result<RuleTemplate, CoreError> {
        let warnings =
            validate_definition(&spec.name, &spec.conditions, &spec.actions, &self.bounds)?;
        let template = RuleTemplate::from_spec(spec);
        log_warnings(&template.name, &warnings);

        info!(template_id = %template.id, name = %template.name, "Template created");
        self.templates
            .insert(template.id.clone(), template.clone());
        Ok(template)
    }

    pub fn get_template(&self, id: &TemplateId) -> Result<&RuleTemplate, CoreError> {
        self.templates
            .get(id)
            .ok_or_else(|| CoreError::TemplateNotFound(id.to_string()))
    }

    pub fn replace_template(
        &mut self,
        id: &TemplateId,
        spec: TemplateSpec,
    ) -> Result<RuleTemplate, CoreError> {
        validate_definition(&spec.name, &spec.conditions, &spec.actions, &self.bounds)?;
        let template = self
            .templates
            .get_mut(id)
            .ok_or_else(|| CoreError::TemplateNotFound(id.to_string()))?;
        template.replace(spec);
        info!(template_id = %id, "Template updated");
        Ok(template.clone())
    }

    pub fn delete_template(&mut self, id: &TemplateId) -> Result<RuleTemplate, CoreError> {
        let template = self
            .templates
            .remove(id)
            .ok_or_else(|| CoreError::TemplateNotFound(id.to_string()))?;
        info!(template_id = %id, "Template deleted");
        Ok(template)
    }

    pub fn list_templates(
        &self,
        filter: &TemplateFilter,
        pagination: &Pagination,
        default_size: usize,
        max_size: usize,
    ) -> Page<RuleTemplate> {
        let mut templates: Vec<RuleTemplate> = self
            .templates
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        templates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        pagination.paginate(templates, default_size, max_size)
    }

    /// Create a new rule stamped from a template.
    pub fn instantiate_template(
        &mut self,
        id: &TemplateId,
        overrides: Instantiation,
    ) -> Result<Validated<PriorityRule>, CoreError> {
        let spec = self.get_template(id)?.instantiate(overrides);
        let created = self.create_rule(spec)?;
        info!(template_id = %id, rule_id = %created.item.id, "Rule instantiated from template");
        Ok(created)
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    fn require_rules(&self, rule_ids: &[RuleId]) -> Result<(), CoreError> {
        match rule_ids.iter().find(|id| !self.rules.contains_key(*id)) {
            Some(missing) => Err(CoreError::RuleNotFound(missing.to_string())),
            None => Ok(()),
        }
    }

    pub fn create_group(&mut self, spec: GroupSpec) -> Result<RuleGroup, CoreError> {
        if spec.name.trim().is_empty() {
            return Err(CoreError::InvalidInput("group name is required".into()));
        }
        self.require_rules(&spec.rule_ids)?;

        let group = RuleGroup::from_spec(spec);
        info!(group_id = %group.id, name = %group.name, rules = group.rule_ids.len(), "Group created");
        self.groups.insert(group.id.clone(), group.clone());
        Ok(group)
    }

    pub fn get_group(&self, id: &GroupId) -> Result<&RuleGroup, CoreError> {
        self.groups
            .get(id)
            .ok_or_else(|| CoreError::GroupNotFound(id.to_string()))
    }

    fn group_mut(&mut self, id: &GroupId) -> Result<&mut RuleGroup, CoreError> {
        self.groups
            .get_mut(id)
            .ok_or_else(|| CoreError::GroupNotFound(id.to_string()))
    }

    pub fn update_group(&mut self, id: &GroupId, patch: GroupPatch) -> Result<RuleGroup, CoreError> {
        let current = self.get_group(id)?;
        check_version("group", id.as_str(), patch.expected_version, current.version)?;
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(CoreError::InvalidInput("group name is required".into()));
            }
        }
        if let Some(rule_ids) = &patch.rule_ids {
            self.require_rules(rule_ids)?;
        }

        let group = self.group_mut(id)?;
        if let Some(name) = patch.name {
            group.name = name;
        }
        if let Some(description) = patch.description {
            group.description = description;
        }
        if let Some(enabled) = patch.enabled {
            group.enabled = enabled;
        }
        if let Some(rule_ids) = patch.rule_ids {
            group.rule_ids.clear();
            for rule_id in rule_ids {
                group.insert_rule(rule_id);
            }
        }
        group.touch();

        info!(group_id = %id, enabled = group.enabled, version = group.version, "Group updated");
        Ok(group.clone())
    }

    /// Delete a group. Its member rules are kept.
    pub fn delete_group(&mut self, id: &GroupId) -> Result<RuleGroup, CoreError> {
        let group = self
            .groups
            .remove(id)
            .ok_or_else(|| CoreError::GroupNotFound(id.to_string()))?;
        info!(group_id = %id, "Group deleted");
        Ok(group)
    }

    pub fn list_groups(
        &self,
        filter: &GroupFilter,
        pagination: &Pagination,
        default_size: usize,
        max_size: usize,
    ) -> Page<RuleGroup> {
        let mut groups: Vec<RuleGroup> = self
            .groups
            .values()
            .filter(|g| filter.matches(g))
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        pagination.paginate(groups, default_size, max_size)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn groups(&self) -> impl Iterator<Item = &RuleGroup> {
        self.groups.values()
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    /// Add a rule to a group. Adding an existing member is a no-op.
    ///
    /// Returns whether the membership changed.
    pub fn add_rule_to_group(
        &mut self,
        group_id: &GroupId,
        rule_id: &RuleId,
    ) -> Result<bool, CoreError> {
        self.get_rule(rule_id)?;
        let group = self.group_mut(group_id)?;
        let added = group.insert_rule(rule_id.clone());
        if added {
            group.touch();
            info!(group_id = %group_id, rule_id = %rule_id, "Rule added to group");
        }
        Ok(added)
    }

    /// Remove a rule from a group. Removing a non-member is a no-op.
    ///
    /// Returns whether the membership changed.
    pub fn remove_rule_from_group(
        &mut self,
        group_id: &GroupId,
        rule_id: &RuleId,
    ) -> Result<bool, CoreError> {
        let group = self.group_mut(group_id)?;
        let removed = group.remove_rule(rule_id);
        if removed {
            group.touch();
            info!(group_id = %group_id, rule_id = %rule_id, "Rule removed from group");
        }
        Ok(removed)
    }

    /// Member rules of a group, in membership order.
    pub fn group_rules(&self, group_id: &GroupId) -> Result<Vec<PriorityRule>, CoreError> {
        let group = self.get_group(group_id)?;
        Ok(group
            .rule_ids
            .iter()
            .filter_map(|id| self.rules.get(id))
            .cloned()
            .collect())
    }
}
