pub mod reconciler;
pub mod reminder;
pub mod whatsapp;
