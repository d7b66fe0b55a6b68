//! Compile-time–checked column identifiers for all tables.

use sea_query::Iden;

#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    Name,
    Email,
    PasswordHash,
    EmailVerifiedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum RefreshTokens {
    Table,
    Id,
    UserId,
    TokenHash,
    ExpiresAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum PersonalAccessTokens {
    Table,
    Id,
    UserId,
    Name,
    TokenHash,
    TokenPrefix,
    LastUsedAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum Cars {
    Table,
    Id,
    UserId,
    Make,
    Model,
    Year,
    Nickname,
    Vin,
    ImagePath,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Modifications {
    Table,
    Id,
    CarId,
    Name,
    Category,
    Brand,
    Vendor,
    InstallationDate,
    Cost,
    IsActive,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Tracks {
    Table,
    Id,
    Name,
    Location,
    Website,
}

#[derive(Iden)]
pub enum Organizers {
    Table,
    Id,
    Name,
    Website,
}

#[derive(Iden)]
pub enum Events {
    Table,
    Id,
    TrackId,
    OrganizerId,
    Title,
    StartDate,
    EndDate,
    Website,
}
