use super::{set_annotation, EXPLICIT};
use crate::internal::InternalModelBuilder;
use modelforge_core::{MetadataResult, TriState, ValueType};
use modelforge_metadata::{Property, PropertyId};

/// Configures one property
pub struct PropertyBuilder<'a> {
    inner: &'a mut InternalModelBuilder,
    property: PropertyId,
}

impl<'a> PropertyBuilder<'a> {
    pub(crate) fn new(inner: &'a mut InternalModelBuilder, property: PropertyId) -> Self {
        Self { inner, property }
    }

    pub fn id(&self) -> PropertyId {
        self.property
    }

    pub fn metadata(&self) -> Option<&Property> {
        self.inner.model().property(self.property)
    }

    /// Required properties are non-nullable; optional ones must be able to
    /// hold null
    pub fn required(&mut self, required: bool) -> MetadataResult<&mut Self> {
        let property = self.property;
        self.inner
            .configure(|b| b.set_property_required(property, required, EXPLICIT))?;
        Ok(self)
    }

    pub fn value_type(&mut self, value_type: ValueType) -> MetadataResult<&mut Self> {
        let property = self.property;
        self.inner
            .configure(|b| b.set_property_type(property, value_type, EXPLICIT))?;
        Ok(self)
    }

    pub fn max_length(&mut self, max_length: Option<usize>) -> MetadataResult<&mut Self> {
        let property = self.property;
        self.inner
            .configure(|b| b.set_max_length(property, max_length, EXPLICIT))?;
        Ok(self)
    }

    pub fn concurrency_token(&mut self, token: bool) -> MetadataResult<&mut Self> {
        let property = self.property;
        self.inner
            .configure(|b| b.set_concurrency_token(property, token, EXPLICIT))?;
        Ok(self)
    }

    pub fn value_generated_on_add(&mut self, generated: bool) -> MetadataResult<&mut Self> {
        let property = self.property;
        self.inner
            .configure(|b| b.set_generate_value_on_add(property, generated, EXPLICIT))?;
        Ok(self)
    }

    pub fn store_computed(&mut self, computed: bool) -> MetadataResult<&mut Self> {
        let property = self.property;
        let value = if computed { TriState::True } else { TriState::False };
        self.inner
            .configure(|b| b.set_store_computed(property, value, EXPLICIT))?;
        Ok(self)
    }

    pub fn store_default(&mut self, use_default: bool) -> MetadataResult<&mut Self> {
        let property = self.property;
        self.inner
            .configure(|b| b.set_use_store_default(property, use_default, EXPLICIT))?;
        Ok(self)
    }

    pub fn annotation(&mut self, name: &str, value: &str) -> MetadataResult<&mut Self> {
        let property = self.property;
        self.inner.configure(|b| {
            let described = b.property_element(property);
            set_annotation(b.model_mut().property_mut(property), described, name, value)
        })?;
        Ok(self)
    }
}
