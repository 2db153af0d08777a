// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Booking form: a draft whose amount is recomputed on every change.

use crate::client::error::{ClientError, ValidationError};
use crate::client::ports::BookingApi;
use crate::client::sync::SyncStore;
use crate::models::{
    AccommodationRateCard, Booking, BookingDraft, BookingRequest, MealType, PaymentConfirmation,
};
use crate::services::pricing::{quote, validate_booking, PricingError, Quote};
use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct BookingForm {
    draft: BookingDraft,
    rates: AccommodationRateCard,
    quote: Result<Quote, PricingError>,
}

impl BookingForm {
    pub fn new(rates: AccommodationRateCard) -> Self {
        Self::with_draft(BookingDraft::default(), rates)
    }

    pub fn with_draft(draft: BookingDraft, rates: AccommodationRateCard) -> Self {
        let quote = quote(&draft, &rates);
        Self {
            draft,
            rates,
            quote,
        }
    }

    /// Build a form from the cached rate card, fetching it when absent.
    pub async fn load(api: &dyn BookingApi, store: &SyncStore) -> Result<Self, ClientError> {
        let rates = match store.rate_card() {
            Some(cached) if cached.is_confirmed() => *cached.get(),
            _ => {
                let rates = api.rate_card().await?;
                store.set_rate_card(rates);
                rates
            }
        };
        Ok(Self::new(rates))
    }

    fn recompute(&mut self) {
        self.quote = quote(&self.draft, &self.rates);
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn rate_card(&self) -> &AccommodationRateCard {
        &self.rates
    }

    pub fn set_stay_date(&mut self, date: Option<NaiveDate>) {
        self.draft.stay_date = date;
    }

    pub fn set_group_size(&mut self, size: u32) {
        self.draft.group_size = size;
        self.recompute();
    }

    pub fn set_group_name(&mut self, name: &str) {
        self.draft.group_name = name.to_string();
    }

    pub fn set_need_stay(&mut self, need_stay: bool) {
        self.draft.need_stay = need_stay;
        self.recompute();
    }

    pub fn set_stay_night(&mut self, nights: u32) {
        self.draft.stay_night = nights;
        self.recompute();
    }

    pub fn set_meal_type(&mut self, meal_type: MealType) {
        self.draft.meal_type = meal_type;
        self.recompute();
    }

    pub fn set_phone(&mut self, phone: &str) {
        self.draft.phone = phone.to_string();
    }

    pub fn set_rate_card(&mut self, rates: AccommodationRateCard) {
        self.rates = rates;
        self.recompute();
    }

    pub fn quote(&self) -> Result<Quote, ValidationError> {
        self.quote.map_err(|_| ValidationError::AmountOverflow)
    }

    pub fn amount(&self) -> Result<u64, ValidationError> {
        self.quote().map(|q| q.total)
    }

    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationError> {
        let errors = validate_booking(&self.draft, today);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Booking(errors))
        }
    }

    /// The request body for a paid booking.
    pub fn request(&self, payment: PaymentConfirmation) -> Result<BookingRequest, ValidationError> {
        Ok(BookingRequest {
            draft: self.draft.clone(),
            amount: self.amount()?,
            payment,
        })
    }

    /// Validate and submit. A stale quote reloads the rate card so the form
    /// shows the server's price.
    pub async fn submit(
        &mut self,
        api: &dyn BookingApi,
        store: &SyncStore,
        payment: PaymentConfirmation,
        today: NaiveDate,
    ) -> Result<Booking, ClientError> {
        self.validate(today)?;
        let request = self.request(payment)?;

        match api.create_booking(&request).await {
            Ok(booking) => {
                tracing::info!(booking_id = %booking.id, amount = booking.amount, "Booking created");
                store.upsert_booking(booking.clone());
                Ok(booking)
            }
            Err(err) => {
                store.notify_error(&err);
                if matches!(err, ClientError::StaleState(_)) {
                    match api.rate_card().await {
                        Ok(rates) => {
                            store.set_rate_card(rates);
                            self.set_rate_card(rates);
                        }
                        Err(e) => tracing::warn!(error = %e, "Rate card refetch failed"),
                    }
                }
                Err(err)
            }
        }
    }
}
