pub mod account_dto;

pub use account_dto::{AccountFilter, AccountResponseDto, ChangeRoleDto, RegisterAccountDto};
