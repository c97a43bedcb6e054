//! Product create and edit flows.
//!
//! Both flows validate first, upload images second and write the document
//! last. Nothing is uploaded or written when validation fails, and a product
//! never references an image that failed to upload.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tracing::{error, info, instrument, warn};

use gem_catalog_core::{ImageList, Price, ProductId};

use crate::error::{AppError, ValidationError};
use crate::models::{NewProduct, Placement, Product, ProductUpdate};
use crate::notices::Notifier;
use crate::services::catalog::{CatalogSync, products_collection};
use crate::storage::{ObjectStorage, StorageError, is_image_content_type, product_image_key};
use crate::store::{DocumentStore, to_fields};

/// An image file attached to a form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Raw product form input.
#[derive(Debug, Clone, Default)]
pub struct ProductForm {
    pub title: String,
    pub description: String,
    pub origin: String,
    /// Price as typed; parsed during validation.
    pub price: String,
    /// `None` keeps the current value on edit and means `false` on create.
    pub is_featured: Option<bool>,
    /// New images to upload.
    pub images: Vec<ImageUpload>,
}

struct ValidFields {
    title: String,
    description: String,
    origin: String,
    price: Price,
}

impl ProductForm {
    fn validate(&self) -> Result<ValidFields, ValidationError> {
        let required = |value: &str, field: &'static str| {
            if value.trim().is_empty() {
                Err(ValidationError::Required(field))
            } else {
                Ok(value.to_owned())
            }
        };

        let fields = ValidFields {
            title: required(&self.title, "Title")?,
            description: required(&self.description, "Description")?,
            origin: required(&self.origin, "Origin")?,
            price: Price::parse(&self.price)?,
        };
        if let Some(upload) = self
            .images
            .iter()
            .find(|upload| !is_image_content_type(upload.content_type.as_deref()))
        {
            return Err(ValidationError::NotAnImage(upload.file_name.clone()));
        }
        Ok(fields)
    }
}

/// Hands out strictly increasing millisecond timestamps.
#[derive(Debug, Default)]
struct MonotonicClock {
    last: Mutex<i64>,
}

impl MonotonicClock {
    fn next_millis(&self) -> i64 {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now().timestamp_millis();
        *last = now.max(*last + 1);
        *last
    }

    fn next(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.next_millis()).unwrap_or_else(Utc::now)
    }
}

/// Clears the in-flight flag when a submission finishes.
struct SubmissionGuard<'a>(&'a AtomicBool);

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Create and edit flows for products.
pub struct ProductForms {
    store: Arc<dyn DocumentStore>,
    storage: Arc<dyn ObjectStorage>,
    notifier: Notifier,
    submitting: AtomicBool,
    clock: MonotonicClock,
}

impl std::fmt::Debug for ProductForms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductForms")
            .field("submitting", &self.is_submitting())
            .finish_non_exhaustive()
    }
}

impl ProductForms {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            storage,
            notifier,
            submitting: AtomicBool::new(false),
            clock: MonotonicClock::default(),
        }
    }

    /// Whether a submission is in flight.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<SubmissionGuard<'_>, AppError> {
        self.submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                warn!("Submission already in progress");
                AppError::SubmissionPending
            })?;
        Ok(SubmissionGuard(&self.submitting))
    }

    fn reject(&self, err: ValidationError) -> AppError {
        warn!(error = %err, "Product form rejected");
        self.notifier.warning(err.to_string());
        AppError::Validation(err)
    }

    async fn upload_all(&self, images: Vec<ImageUpload>) -> Result<Vec<String>, StorageError> {
        let uploads = images.into_iter().map(|image| {
            let key = product_image_key(self.clock.next_millis(), &image.file_name);
            let storage = Arc::clone(&self.storage);
            async move {
                let url = storage
                    .upload(&key, image.bytes, image.content_type.as_deref())
                    .await?;
                Ok::<_, StorageError>(url.to_string())
            }
        });
        try_join_all(uploads).await
    }

    /// Create a product filed under `placement`.
    ///
    /// Requires title, description, origin, a numeric price and one to five
    /// images. Images are uploaded before the document is written.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::SubmissionPending`] while another submission runs,
    /// [`AppError::Validation`] for bad input, or [`AppError::Storage`] /
    /// [`AppError::Store`] if an upload or the write fails.
    #[instrument(skip(self, form, placement), fields(category_id = %placement.category.id))]
    pub async fn create(
        &self,
        form: ProductForm,
        placement: Placement,
    ) -> Result<ProductId, AppError> {
        let _guard = self.begin()?;

        let fields = form.validate().map_err(|e| self.reject(e))?;
        if form.images.is_empty() {
            return Err(self.reject(ValidationError::NoImages));
        }
        ImageList::check_room(0, form.images.len()).map_err(|e| self.reject(e.into()))?;

        let urls = self.upload_all(form.images).await.map_err(|e| {
            error!(error = %e, "Failed to upload product images");
            self.notifier.error("Failed to create product");
            AppError::Storage(e)
        })?;
        let images = ImageList::from_urls(urls).map_err(|e| self.reject(e.into()))?;

        let product = NewProduct {
            title: fields.title,
            description: fields.description,
            origin: fields.origin,
            price: fields.price,
            images,
            category_id: placement.category.id,
            category_name: placement.category.name,
            subcategory_id: placement.subcategory.id,
            subcategory_name: placement.subcategory.name,
            is_featured: form.is_featured.unwrap_or(false),
            created_at: self.clock.next(),
        };

        let result = match to_fields(&product) {
            Ok(data) => self.store.add(&products_collection(), data).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(id) => {
                info!(product_id = %id, "Product created");
                self.notifier.success("Product created!");
                Ok(ProductId::new(id))
            }
            Err(e) => {
                error!(error = %e, "Failed to create product");
                self.notifier.error("Failed to create product");
                Err(e.into())
            }
        }
    }

    /// Edit an existing product.
    ///
    /// New images are appended to the stored list. If they would take it
    /// past five, nothing is uploaded and the product is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the product does not exist, plus
    /// the errors of [`Self::create`].
    #[instrument(skip(self, catalog, form), fields(product_id = %id))]
    pub async fn edit(
        &self,
        catalog: &CatalogSync,
        id: &ProductId,
        form: ProductForm,
    ) -> Result<(), AppError> {
        let _guard = self.begin()?;

        let fields = form.validate().map_err(|e| self.reject(e))?;
        let existing = self.load(id).await?;
        ImageList::check_room(existing.images.len(), form.images.len())
            .map_err(|e| self.reject(e.into()))?;

        let mut images = existing.images;
        if !form.images.is_empty() {
            let urls = self.upload_all(form.images).await.map_err(|e| {
                error!(error = %e, "Failed to upload product images");
                self.notifier.error("Failed to update product");
                AppError::Storage(e)
            })?;
            images.extend(urls).map_err(|e| self.reject(e.into()))?;
        }

        let update = ProductUpdate {
            title: Some(fields.title),
            description: Some(fields.description),
            origin: Some(fields.origin),
            price: Some(fields.price),
            images: Some(images),
            is_featured: Some(form.is_featured.unwrap_or(existing.is_featured)),
        };
        catalog.update(id, &update).await
    }

    async fn load(&self, id: &ProductId) -> Result<Product, AppError> {
        let path = products_collection().doc(id);
        match self.store.get(&path).await {
            Ok(Some(doc)) => Ok(doc.decode()?),
            Ok(None) => {
                self.notifier.error("Failed to update product");
                Err(AppError::NotFound(path.to_string()))
            }
            Err(e) => {
                error!(error = %e, "Failed to read product");
                self.notifier.error("Failed to update product");
                Err(e.into())
            }
        }
    }
}
