//! Domain models for membership-service
//!
//! This module contains the member record, its client-facing view and the
//! request/response bodies of the HTTP surface.

pub mod member;

pub use member::{
    LoginRequest, LoginResponse, Member, MemberProfile, MemberUpdate, MessageResponse, NewMember,
    RegisterRequest, RegisterResponse, UpdateMemberRequest,
};
