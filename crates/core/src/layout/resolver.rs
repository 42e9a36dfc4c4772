use super::{FieldId, Repeat, ResolvedField, ResolvedLayout, ValueCategory};
use crate::clause::interpret;
use crate::declaration::{DeclName, Declaration, LEVEL_CONDITION, LEVEL_RENAMES, Occurs};
use crate::diag_util::{ctx, diag};
use copylens_diagnostics::{Diagnostic, codes};
use copylens_profile::{DEFAULT_MAX_OCCURS, DecodeProfile};
use std::collections::{BTreeSet, HashMap};

/// Knobs that change the shape of a resolved layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolveOptions {
    /// Largest number of elements materialized for one repetition.
    pub max_occurs: u32,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_occurs: DEFAULT_MAX_OCCURS,
        }
    }
}

impl From<&DecodeProfile> for ResolveOptions {
    fn from(profile: &DecodeProfile) -> Self {
        Self {
            max_occurs: profile.max_occurs,
        }
    }
}

/// Resolve a declaration tree with default options.
///
/// ```
/// use copylens_core::{Declaration, resolve};
///
/// let decl = Declaration::group(1, "REC", vec![
///     Declaration::elementary(5, "A", "PIC X(4)"),
///     Declaration::elementary(5, "B", "PIC 9(3)"),
/// ]);
/// let layout = resolve(&decl);
/// assert_eq!(layout.width(), 7);
/// assert_eq!(layout.get("B").unwrap().offset, 4);
/// ```
pub fn resolve(decl: &Declaration) -> ResolvedLayout {
    resolve_with_options(decl, &ResolveOptions::default())
}

/// Resolve a declaration tree with the repetition cap from `profile`.
pub fn resolve_with_profile(decl: &Declaration, profile: &DecodeProfile) -> ResolvedLayout {
    resolve_with_options(decl, &ResolveOptions::from(profile))
}

/// Resolve a declaration tree.
///
/// Never fails: anything that cannot be laid out precisely is recorded in
/// [`ResolvedLayout::diagnostics`] and the affected fields are marked
/// [`ValueCategory::Unsupported`].
pub fn resolve_with_options(decl: &Declaration, options: &ResolveOptions) -> ResolvedLayout {
    let mut resolver = Resolver {
        max_occurs: options.max_occurs.max(1),
        fields: Vec::new(),
        by_path: HashMap::new(),
        controllers: BTreeSet::new(),
        diagnostics: Vec::new(),
    };

    let root_name = decl
        .name
        .as_named()
        .map_or_else(|| "FILLER".to_string(), str::to_ascii_uppercase);
    if let Some(target) = &decl.redefines {
        resolver.diagnostics.push(
            diag(
                codes::ALIAS_TARGET_MISSING,
                format!("record root cannot redefine `{target}`"),
                Some(&root_name),
            )
            .with_context(ctx!("target" => target.as_str())),
        );
    }
    resolver.place(decl, root_name.clone(), root_name, None, 0, None);

    let layout = ResolvedLayout {
        fingerprint: decl.fingerprint(),
        max_occurs: resolver.max_occurs,
        fields: resolver.fields,
        by_path: resolver.by_path,
        controllers: resolver.controllers,
        diagnostics: resolver.diagnostics,
    };
    tracing::debug!(
        root = %layout.root().path,
        width = layout.width(),
        fields = layout.fields.len(),
        diagnostics = layout.diagnostics.len(),
        "resolved layout"
    );
    layout
}

/// A sibling that later siblings may redefine, with the storage it owns.
struct Slot {
    name: String,
    offset: usize,
    width: usize,
    path: String,
}

struct Resolver {
    max_occurs: u32,
    fields: Vec<ResolvedField>,
    by_path: HashMap<String, FieldId>,
    controllers: BTreeSet<FieldId>,
    diagnostics: Vec<Diagnostic>,
}

impl Resolver {
    fn push(&mut self, field: ResolvedField) -> FieldId {
        let id = self.fields.len();
        tracing::trace!(
            path = %field.path,
            offset = field.offset,
            width = field.width,
            category = ?field.category,
            "placed field"
        );
        if self.by_path.contains_key(&field.path) {
            self.diagnostics.push(
                diag(
                    codes::DUPLICATE_PATH,
                    format!("`{}` is declared more than once; queries return the first", field.path),
                    Some(&field.path),
                ),
            );
        } else {
            self.by_path.insert(field.path.clone(), id);
        }
        self.fields.push(field);
        id
    }

    fn report(&mut self, diagnostic: Diagnostic) -> usize {
        self.diagnostics.push(diagnostic);
        self.diagnostics.len() - 1
    }

    /// Storage under `path` no longer fits in `usize`; the value saturates.
    fn overflow(&mut self, path: &str, what: &'static str) {
        self.report(
            diag(
                codes::UNKNOWN_WIDTH,
                format!("{what} width exceeds the addressable range; later offsets may be wrong"),
                Some(path),
            )
            .with_context(ctx!("overflow" => what)),
        );
    }

    /// `count × element_width`, saturating with a diagnostic on overflow.
    fn repeat_width(&mut self, id: FieldId, count: u32, element_width: usize) -> usize {
        if let Some(width) = (count as usize).checked_mul(element_width) {
            return width;
        }
        let path = self.fields[id].path.clone();
        self.overflow(&path, "repetition");
        usize::MAX
    }

    /// Place `decl` at `offset`, expanding its repetition if any.
    fn place(
        &mut self,
        decl: &Declaration,
        name: String,
        path: String,
        parent: Option<FieldId>,
        offset: usize,
        alias_of: Option<String>,
    ) -> FieldId {
        match &decl.occurs {
            None => self.place_single(decl, name, path, parent, offset, alias_of),
            Some(Occurs::Fixed { count }) => {
                self.place_fixed(decl, *count, name, path, parent, offset, alias_of)
            }
            Some(Occurs::DependingOn {
                min,
                max,
                controller,
            }) => self.place_dynamic(
                decl,
                (*min, *max),
                controller,
                name,
                path,
                parent,
                offset,
                alias_of,
            ),
        }
    }

    fn container(
        &mut self,
        name: String,
        path: String,
        parent: Option<FieldId>,
        offset: usize,
        alias_of: Option<String>,
    ) -> FieldId {
        self.push(ResolvedField {
            path,
            name,
            offset,
            width: 0,
            category: ValueCategory::Group,
            scale: 0,
            signed: false,
            clause: None,
            alias_of,
            repeat: None,
            parent,
            children: Vec::new(),
            diagnostic: None,
        })
    }

    /// Place element `[1]` of a repetition under `container`.
    fn place_first_element(&mut self, decl: &Declaration, container: FieldId) -> FieldId {
        let name = format!("{}[1]", self.fields[container].name);
        let path = format!("{}[1]", self.fields[container].path);
        let offset = self.fields[container].offset;
        self.place_single(decl, name, path, Some(container), offset, None)
    }

    #[allow(clippy::too_many_arguments)]
    fn place_fixed(
        &mut self,
        decl: &Declaration,
        count: u32,
        name: String,
        path: String,
        parent: Option<FieldId>,
        offset: usize,
        alias_of: Option<String>,
    ) -> FieldId {
        let id = self.container(name, path, parent, offset, alias_of);
        if count == 0 {
            self.fields[id].repeat = Some(Repeat::Fixed {
                count: 0,
                materialized: 0,
                element_width: 0,
            });
            return id;
        }

        let materialized = count.min(self.max_occurs);
        if materialized < count {
            let container_path = self.fields[id].path.clone();
            self.report(
                diag(
                    codes::OCCURS_LIMIT,
                    format!(
                        "{count} elements declared; only the first {materialized} are materialized"
                    ),
                    Some(&container_path),
                )
                .with_context(ctx!(
                    "declared" => count.to_string(),
                    "materialized" => materialized.to_string(),
                )),
            );
        }

        let first = self.place_first_element(decl, id);
        let element_width = self.fields[first].width;
        let first_path = self.fields[first].path.clone();
        let mut children = vec![first];
        for i in 2..=materialized {
            let new_path = format!("{}[{i}]", self.fields[id].path);
            let shift = (i as usize - 1).saturating_mul(element_width);
            let renames = [(first_path.clone(), new_path)];
            children.push(self.clone_shifted(first, shift, &renames, id));
        }

        let width = self.repeat_width(id, count, element_width);
        let field = &mut self.fields[id];
        field.children = children;
        field.width = width;
        field.repeat = Some(Repeat::Fixed {
            count,
            materialized,
            element_width,
        });
        id
    }

    #[allow(clippy::too_many_arguments)]
    fn place_dynamic(
        &mut self,
        decl: &Declaration,
        (min, max): (u32, u32),
        controller: &str,
        name: String,
        path: String,
        parent: Option<FieldId>,
        offset: usize,
        alias_of: Option<String>,
    ) -> FieldId {
        let id = self.container(name, path, parent, offset, alias_of);
        let container_path = self.fields[id].path.clone();
        let controller_id = self.find_controller(controller);

        let first = self.place_first_element(decl, id);
        let element_width = self.fields[first].width;
        let width = self.repeat_width(id, max, element_width);
        let field = &mut self.fields[id];
        field.children = vec![first];
        field.width = width;

        let Some(controller_id) = controller_id else {
            let index = self.report(
                diag(
                    codes::UNRESOLVED_OCCURS_COUNT,
                    format!(
                        "count field `{controller}` is not an earlier non-repeated numeric field"
                    ),
                    Some(&container_path),
                )
                .with_context(ctx!("controller" => controller)),
            );
            let field = &mut self.fields[id];
            field.category = ValueCategory::Unsupported;
            field.diagnostic = Some(index);
            return id;
        };

        let controller_path = self.fields[controller_id].path.clone();
        self.controllers.insert(controller_id);
        self.report(
            diag(
                codes::VARIABLE_OCCURS,
                format!(
                    "{min} to {max} elements depending on `{controller_path}`; storage reserved for {max}"
                ),
                Some(&container_path),
            )
            .with_context(ctx!(
                "controller" => controller_path.as_str(),
                "min" => min.to_string(),
                "max" => max.to_string(),
            )),
        );
        self.fields[id].repeat = Some(Repeat::Dynamic {
            min: min.min(max),
            max,
            controller: controller_id,
            controller_path,
            element_width,
        });
        id
    }

    /// Most recently placed numeric field outside any repetition whose
    /// path or name matches `controller`.
    fn find_controller(&self, controller: &str) -> Option<FieldId> {
        let wanted = controller.trim().to_ascii_uppercase();
        let usable = |f: &ResolvedField| {
            matches!(
                f.category,
                ValueCategory::NumericDisplay | ValueCategory::NumericPacked
            ) && !f.path.contains('[')
        };
        if wanted.contains('.') {
            let root = &self.fields.first()?.name;
            let full = if wanted.split('.').next() == Some(root.as_str()) {
                wanted.clone()
            } else {
                format!("{root}.{wanted}")
            };
            return self
                .by_path
                .get(&full)
                .copied()
                .filter(|&id| usable(&self.fields[id]));
        }
        self.fields
            .iter()
            .enumerate()
            .rev()
            .find(|(_, f)| f.name == wanted && usable(f))
            .map(|(id, _)| id)
    }

    /// Copy the subtree at `src` shifted by `shift` bytes with paths renamed.
    fn clone_shifted(
        &mut self,
        src: FieldId,
        shift: usize,
        renames: &[(String, String)],
        parent: FieldId,
    ) -> FieldId {
        use crate::diag_util::{last_segment, rewrite_path};

        let template = &self.fields[src];
        let path = rewrite_path(&template.path, renames);
        let mut field = ResolvedField {
            name: last_segment(&path).to_string(),
            path,
            offset: template.offset.saturating_add(shift),
            alias_of: template.alias_of.as_deref().map(|a| rewrite_path(a, renames)),
            parent: Some(parent),
            children: Vec::new(),
            ..template.clone()
        };
        if let Some(Repeat::Dynamic {
            controller_path, ..
        }) = &mut field.repeat
        {
            *controller_path = rewrite_path(controller_path, renames);
        }
        let template_children = self.fields[src].children.clone();
        let id = self.push(field);
        let children = template_children
            .into_iter()
            .map(|c| self.clone_shifted(c, shift, renames, id))
            .collect();
        self.fields[id].children = children;
        id
    }

    /// Place one non-repeated group or elementary item.
    fn place_single(
        &mut self,
        decl: &Declaration,
        name: String,
        path: String,
        parent: Option<FieldId>,
        offset: usize,
        alias_of: Option<String>,
    ) -> FieldId {
        if decl.is_group() {
            if let Some(clause) = &decl.clause {
                self.report(
                    diag(
                        codes::GROUP_CLAUSE_IGNORED,
                        format!("clause `{clause}` on a group item is ignored"),
                        Some(&path),
                    )
                    .with_context(ctx!("clause" => clause.as_str())),
                );
            }
            let id = self.container(name, path, parent, offset, alias_of);
            let width = self.place_children(decl, id);
            self.fields[id].width = width;
            return id;
        }

        let mut field = ResolvedField {
            path,
            name,
            offset,
            width: 0,
            category: ValueCategory::Unsupported,
            scale: 0,
            signed: false,
            clause: None,
            alias_of,
            repeat: None,
            parent,
            children: Vec::new(),
            diagnostic: None,
        };

        match decl.clause.as_deref().map(interpret) {
            Some(Ok(spec)) => {
                field.category = spec.category.into();
                field.width = spec.width;
                field.scale = spec.scale;
                field.signed = spec.signed;
                field.clause = Some(spec);
            }
            Some(Err(unsupported)) => {
                let mut context = ctx!(
                    "clause" => unsupported.clause.as_str(),
                    "reason" => unsupported.reason.as_str(),
                );
                if let Some(width) = unsupported.best_effort_width {
                    context.insert("width".into(), width.to_string());
                }
                field.diagnostic = Some(
                    self.report(
                        diag(codes::UNSUPPORTED_CLAUSE, unsupported.to_string(), Some(&field.path))
                            .with_context(context),
                    ),
                );
                match unsupported.best_effort_width {
                    Some(width) => field.width = width,
                    None => {
                        self.report(
                            diag(
                                codes::UNKNOWN_WIDTH,
                                "no width could be derived; later offsets may be wrong",
                                Some(&field.path),
                            )
                            .with_context(ctx!("clause" => unsupported.clause.as_str())),
                        );
                    }
                }
            }
            None => {
                field.diagnostic = Some(self.report(diag(
                    codes::MISSING_CLAUSE,
                    "elementary item has no storage clause",
                    Some(&field.path),
                )));
            }
        }
        self.push(field)
    }

    /// Lay out the children of group `id`. Returns the group's width.
    fn place_children(&mut self, decl: &Declaration, id: FieldId) -> usize {
        let base = self.fields[id].offset;
        let group_path = self.fields[id].path.clone();
        let mut cursor = base;
        let mut overflowed = false;
        let mut fillers = 0u32;
        let mut slots: Vec<Slot> = Vec::new();
        let mut children = Vec::new();

        for child in &decl.children {
            if child.level == LEVEL_CONDITION {
                continue;
            }
            let name = match &child.name {
                DeclName::Named(name) => name.to_ascii_uppercase(),
                DeclName::Filler => {
                    fillers += 1;
                    format!("FILLER#{fillers}")
                }
            };
            let path = format!("{group_path}.{name}");
            if child.level == LEVEL_RENAMES {
                self.report(diag(
                    codes::RENAMES_IGNORED,
                    "level-66 regrouping is not laid out",
                    Some(&path),
                ));
                continue;
            }

            if let Some(target) = &child.redefines {
                let wanted = target.trim().to_ascii_uppercase();
                if let Some(slot) = slots.iter().rev().find(|s| s.name == wanted) {
                    let (offset, target_width, target_path) =
                        (slot.offset, slot.width, slot.path.clone());
                    let alias =
                        self.place(child, name.clone(), path, Some(id), offset, Some(target_path.clone()));
                    let alias_width = self.fields[alias].width;
                    if alias_width > target_width {
                        let alias_path = self.fields[alias].path.clone();
                        self.report(
                            diag(
                                codes::ALIAS_WIDTH_MISMATCH,
                                format!(
                                    "{alias_width} bytes overlay {target_width} bytes of `{target_path}`"
                                ),
                                Some(&alias_path),
                            )
                            .with_context(ctx!(
                                "target" => target_path.as_str(),
                                "alias_width" => alias_width.to_string(),
                                "target_width" => target_width.to_string(),
                            )),
                        );
                    }
                    slots.push(Slot {
                        name,
                        offset,
                        width: target_width,
                        path: target_path,
                    });
                    children.push(alias);
                    continue;
                }
                self.report(
                    diag(
                        codes::ALIAS_TARGET_MISSING,
                        format!("`{target}` is not an earlier sibling; laid out as ordinary storage"),
                        Some(&path),
                    )
                    .with_context(ctx!("target" => target.as_str())),
                );
            }

            let placed = self.place(child, name.clone(), path, Some(id), cursor, None);
            let width = self.fields[placed].width;
            slots.push(Slot {
                name,
                offset: cursor,
                width,
                path: self.fields[placed].path.clone(),
            });
            children.push(placed);
            cursor = match cursor.checked_add(width) {
                Some(next) => next,
                None => {
                    if !overflowed {
                        overflowed = true;
                        self.overflow(&group_path, "group");
                    }
                    usize::MAX
                }
            };
        }

        self.fields[id].children = children;
        cursor - base
    }
}
