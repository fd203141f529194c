use crate::{
    db::{
        context::{ContextInner, ModelState, Shared, tracked::CachedLookup},
        query::{
            ComparisonType, ExpressionNode, Operand, QueryPlan,
            expr::{Detail, Lookup, Prop},
        },
    },
    error::Error,
    model::{Member, ModelSchema},
    obs::sink::ExecKind,
    traits::{FieldValue, Model},
    types::Guid,
    value::{Value, ValueType},
};
use std::{
    fmt,
    marker::PhantomData,
    ptr,
    rc::{Rc, Weak},
    sync::Arc,
};

///
/// ModelRef
///
/// Handle on one tracked instance of `T`. Clones share state; two handles
/// obtained for the same key from one context are `ptr_eq`.
///

pub struct ModelRef<T> {
    pub(crate) model: Shared,
    context: Weak<ContextInner>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Model> ModelRef<T> {
    pub(crate) const fn new(model: Shared, context: Weak<ContextInner>) -> Self {
        Self {
            model,
            context,
            _marker: PhantomData,
        }
    }

    pub(crate) fn belongs_to(&self, inner: &Rc<ContextInner>) -> bool {
        ptr::eq(self.context.as_ptr(), Rc::as_ptr(inner))
    }

    #[must_use]
    pub fn id(&self) -> Guid {
        self.model.borrow().key
    }

    #[must_use]
    pub fn state(&self) -> ModelState {
        self.model.borrow().state
    }

    #[must_use]
    pub const fn schema_name(&self) -> &'static str {
        T::SCHEMA_NAME
    }

    /// Whether both handles point at the same tracked instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.model, &other.model)
    }

    /// Changed (column, value) pairs against the last snapshot.
    #[must_use]
    pub fn changes(&self) -> Vec<(String, Value)> {
        self.model.borrow().changes()
    }

    /// Typed read. Props reached through lookups resolve those lookups
    /// lazily; a null value or unresolved lookup reads as `None`.
    pub fn get<V: FieldValue>(&self, prop: &Prop<T, V>) -> Result<Option<V>, Error> {
        let (via, name) = split_path(prop.path());
        let Some(owner) = self.walk(via)? else {
            return Ok(None);
        };

        let model = owner.borrow();
        let column = scalar_column(&model.schema, name)?;
        match model.value(&column) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => V::from_value(value).map(Some).ok_or_else(|| {
                Error::invalid_state(format!(
                    "{}.{name} holds {value}, not {}",
                    model.schema_name(),
                    V::VALUE_TYPE
                ))
            }),
        }
    }

    /// Typed write on a direct property of `T`.
    pub fn set<V: FieldValue>(&self, prop: &Prop<T, V>, value: impl Into<V>) -> Result<(), Error> {
        let name = direct_name(prop.path())?;

        self.set_value(name, value.into().to_value())
    }

    pub fn set_null<V>(&self, prop: &Prop<T, V>) -> Result<(), Error> {
        let name = direct_name(prop.path())?;

        self.set_value(name, Value::Null)
    }

    /// Untyped read of a scalar or lookup column by property name.
    /// `None` means the column was never loaded.
    pub fn value(&self, name: &str) -> Result<Option<Value>, Error> {
        let model = self.model.borrow();
        let column = scalar_column(&model.schema, name)?;

        Ok(model.value(&column).cloned())
    }

    /// Untyped write; the value is coerced to the column type.
    pub fn set_value(&self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        let mut model = self.model.borrow_mut();
        ensure_live(model.state, model.schema_name(), model.key)?;

        let column = scalar_column(&model.schema, name)?;
        if column == model.schema.key_column() {
            return Err(Error::invalid_state(format!(
                "{}.{name} is the primary key and cannot change",
                model.schema_name()
            )));
        }

        let ty = model.schema.column_type(&column).unwrap_or(ValueType::Text);
        let value: Value = value.into();
        let value = value
            .coerce_to(ty)
            .map_err(|err| Error::invalid_state(format!("{}.{name}: {err}", model.schema_name())))?;
        model.write(&column, value);

        Ok(())
    }

    /// Resolve a lookup, fetching the target on first access. The result is
    /// memoized while the lookup column keeps the same key.
    pub fn lookup<U: Model>(&self, lookup: &Lookup<T, U>) -> Result<Option<ModelRef<U>>, Error> {
        let target = self.walk(lookup.path())?;

        Ok(target.map(|target| ModelRef::new(target, Weak::clone(&self.context))))
    }

    /// Point a direct lookup at `target`, or clear it.
    pub fn set_lookup<U: Model>(
        &self,
        lookup: &Lookup<T, U>,
        target: Option<&ModelRef<U>>,
    ) -> Result<(), Error> {
        let name = direct_name(lookup.path())?;

        match target {
            Some(target) => {
                let key = target.id();
                self.set_value(name, Value::Guid(key))?;
                self.model.borrow_mut().lookups.insert(
                    name.to_string(),
                    CachedLookup {
                        key,
                        target: Rc::clone(&target.model),
                    },
                );
            }
            None => {
                self.set_value(name, Value::Null)?;
                self.model.borrow_mut().lookups.remove(name);
            }
        }

        Ok(())
    }

    /// Children of a detail collection, fetched on first access and
    /// memoized. Deleted children are left out.
    pub fn details<U: Model>(&self, detail: &Detail<T, U>) -> Result<Vec<ModelRef<U>>, Error> {
        let inner = self.context()?;
        let name = detail.name();

        let cached = self.model.borrow().details.get(name).cloned();
        let children = match cached {
            Some(children) => children,
            None => {
                let children = fetch_details(&inner, &self.model, name)?;
                // an unsaved master has nothing to memoize yet
                let mut model = self.model.borrow_mut();
                if model.persisted {
                    model.details.insert(name.to_string(), children.clone());
                }
                children
            }
        };

        Ok(children
            .into_iter()
            .filter(|child| child.borrow().state != ModelState::Deleted)
            .map(|child| ModelRef::new(child, Weak::clone(&self.context)))
            .collect())
    }

    fn context(&self) -> Result<Rc<ContextInner>, Error> {
        self.context
            .upgrade()
            .ok_or_else(|| Error::invalid_state("data context has been dropped"))
    }

    // Follow lookup names from this instance.
    fn walk(&self, via: &[&str]) -> Result<Option<Shared>, Error> {
        if via.is_empty() {
            return Ok(Some(Rc::clone(&self.model)));
        }

        let inner = self.context()?;
        let mut current = Rc::clone(&self.model);
        for name in via {
            match resolve_lookup(&inner, &current, name)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }

        Ok(Some(current))
    }
}

impl<T> Clone for ModelRef<T> {
    fn clone(&self) -> Self {
        Self {
            model: Rc::clone(&self.model),
            context: Weak::clone(&self.context),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ModelRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.model.borrow(), f)
    }
}

fn split_path<'p>(path: &'p [&'static str]) -> (&'p [&'static str], &'static str) {
    match path.split_last() {
        Some((last, via)) => (via, last),
        None => (&[], ""),
    }
}

fn direct_name(path: &[&'static str]) -> Result<&'static str, Error> {
    match path {
        [name] => Ok(name),
        _ => Err(Error::invalid_state(format!(
            "'{}' is not a direct property",
            path.join(".")
        ))),
    }
}

fn ensure_live(state: ModelState, schema: &str, key: Guid) -> Result<(), Error> {
    if state == ModelState::Deleted {
        Err(Error::invalid_state(format!(
            "{schema} '{key}' is deleted and cannot be modified"
        )))
    } else {
        Ok(())
    }
}

// Wire column for a scalar or lookup property.
fn scalar_column(schema: &ModelSchema, name: &str) -> Result<String, Error> {
    schema.column_of(name).map(ToString::to_string).ok_or_else(|| {
        Error::invalid_state(format!(
            "{} has no scalar or lookup property '{name}'",
            schema.schema_name()
        ))
    })
}

fn resolve_lookup(inner: &ContextInner, owner: &Shared, name: &str) -> Result<Option<Shared>, Error> {
    let (target_type, target_name, key) = {
        let model = owner.borrow();
        let Some(Member::Lookup(lookup)) = model.schema.member(name) else {
            return Err(Error::invalid_state(format!(
                "{} has no lookup '{name}'",
                model.schema_name()
            )));
        };
        let key = match model.value(&lookup.wire_column) {
            Some(Value::Guid(key)) => *key,
            _ => return Ok(None),
        };
        if let Some(cached) = model.lookups.get(name)
            && cached.key == key
        {
            return Ok(Some(Rc::clone(&cached.target)));
        }

        (lookup.target_type, lookup.target_schema.clone(), key)
    };

    let schema = inner
        .registry
        .schema_of(target_type)
        .ok_or_else(|| Error::invalid_state(format!("{target_name} is not registered")))?;

    // Unsaved targets exist only locally.
    let local = inner
        .identity
        .borrow()
        .get(schema.schema_name(), key)
        .filter(|shared| !shared.borrow().persisted);
    let target = match local {
        Some(target) => target,
        None => inner
            .with_sink(|| inner.fetch_by_key(&schema, key, ExecKind::Lazy))?
            .ok_or_else(|| Error::not_found(target_name, key))?,
    };

    owner.borrow_mut().lookups.insert(
        name.to_string(),
        CachedLookup {
            key,
            target: Rc::clone(&target),
        },
    );

    Ok(Some(target))
}

fn fetch_details(inner: &ContextInner, master: &Shared, name: &str) -> Result<Vec<Shared>, Error> {
    let (child_type, link_column, master_value) = {
        let model = master.borrow();
        let Some(detail) = model.schema.detail(name) else {
            return Err(Error::invalid_state(format!(
                "{} has no detail '{name}'",
                model.schema_name()
            )));
        };
        if !model.persisted {
            return Ok(Vec::new());
        }
        let master_value = match model.value(detail.master_column()) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(value) => value.clone(),
        };

        (
            detail.target_type,
            detail.link_column().to_string(),
            master_value,
        )
    };

    let schema = inner
        .registry
        .schema_of(child_type)
        .ok_or_else(|| Error::invalid_state("detail model is not registered"))?;
    let plan = link_plan(&schema, &link_column, master_value);

    inner.with_sink(|| inner.load(&schema, &plan, ExecKind::Lazy))
}

// Every child whose link column holds `master_value`.
fn link_plan(schema: &Arc<ModelSchema>, link_column: &str, master_value: Value) -> QueryPlan {
    let ty = schema.column_type(link_column).unwrap_or(ValueType::Guid);
    let constant_type = master_value.value_type().unwrap_or(ty);

    let mut plan = QueryPlan::for_model(schema);
    plan.and_filter(ExpressionNode::Comparison {
        op: ComparisonType::Equal,
        left: Box::new(ExpressionNode::column(link_column, ty)),
        right: Operand::Single(Box::new(ExpressionNode::constant(
            constant_type,
            master_value,
        ))),
    });

    plan
}
