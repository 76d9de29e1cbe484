use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Member, Type};

/// Implements `PoolSlotAccess` for a struct that stores a `PoolSlot`.
///
/// The slot field is either marked with `#[pool_slot]` or is the first field
/// whose type is named `PoolSlot`.
///
/// ```ignore
/// #[derive(Pooled, Default)]
/// struct Bullet {
///     slot: PoolSlot,
///     velocity: Vec3,
/// }
/// ```
#[proc_macro_derive(Pooled, attributes(pool_slot))]
pub fn derive_pooled(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let field = match find_slot_field(&input) {
        Ok(field) => field,
        Err(err) => return err.to_compile_error().into(),
    };

    let expanded = quote! {
        impl #impl_generics ::bevy_gamekit::poolable::PoolSlotAccess for #name #ty_generics #where_clause {
            fn pool_slot(&self) -> &::bevy_gamekit::poolable::PoolSlot {
                &self.#field
            }

            fn pool_slot_mut(&mut self) -> &mut ::bevy_gamekit::poolable::PoolSlot {
                &mut self.#field
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };

    TokenStream::from(expanded)
}

fn find_slot_field(input: &DeriveInput) -> syn::Result<Member> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Pooled can only be derived for structs",
        ));
    };

    let members: Vec<(Member, &syn::Field)> = match &data.fields {
        Fields::Named(named) => named
            .named
            .iter()
            .filter_map(|f| f.ident.clone().map(|ident| (Member::Named(ident), f)))
            .collect(),
        Fields::Unnamed(unnamed) => unnamed
            .unnamed
            .iter()
            .enumerate()
            .map(|(i, f)| (Member::Unnamed(i.into()), f))
            .collect(),
        Fields::Unit => Vec::new(),
    };

    // An explicit attribute wins over type-name matching
    if let Some((member, _)) = members
        .iter()
        .find(|(_, f)| f.attrs.iter().any(|a| a.path().is_ident("pool_slot")))
    {
        return Ok(member.clone());
    }

    members
        .iter()
        .find(|(_, f)| is_pool_slot_type(&f.ty))
        .map(|(member, _)| member.clone())
        .ok_or_else(|| {
            syn::Error::new_spanned(
                &input.ident,
                "Pooled requires a `PoolSlot` field or a field marked #[pool_slot]",
            )
        })
}

fn is_pool_slot_type(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|segment| segment.ident == "PoolSlot")
            .unwrap_or(false),
        _ => false,
    }
}
