mod accounts;
mod helpers;
mod mocks;
mod payments;
mod terminals;
mod webhooks;
